use super::*;

/// Mobile navigation toggle. The expanded flag is the one source of truth;
/// the `aria-expanded` attribute and the menu's `active` class are rendered
/// from it after every transition and never read back.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NavToggle {
    pub(crate) toggle: NodeId,
    pub(crate) menu: NodeId,
    pub(crate) expanded: bool,
}

pub(crate) const ACTIVE_CLASS: &str = "active";

pub(crate) fn wire(page: &mut Page) -> Result<()> {
    let toggle = page.dom.by_id(&page.config.nav_toggle_id);
    let menu = page.dom.by_id(&page.config.nav_menu_id);
    let (Some(toggle), Some(menu)) = (toggle, menu) else {
        // Either element missing disables the whole component.
        return Ok(());
    };

    let expanded = page.dom.attr(toggle, "aria-expanded").as_deref() == Some("true");
    page.nav = Some(NavToggle {
        toggle,
        menu,
        expanded,
    });

    page.add_listener(toggle, "click", false, Handler::NavToggle);
    for link in page.dom.query_selector_all_from(menu, "a")? {
        page.add_listener(link, "click", false, Handler::NavMenuLink);
    }
    page.add_listener(page.dom.root, "click", false, Handler::NavOutsideClose);
    Ok(())
}

pub(crate) fn render(dom: &mut Dom, nav: NavToggle) -> Result<()> {
    let value = if nav.expanded { "true" } else { "false" };
    dom.set_attr(nav.toggle, "aria-expanded", value)?;
    if nav.expanded {
        dom.add_class(nav.menu, ACTIVE_CLASS)?;
    } else {
        dom.remove_class(nav.menu, ACTIVE_CLASS)?;
    }
    Ok(())
}

impl Page {
    pub(crate) fn nav_toggle_click(&mut self) -> Result<()> {
        let Some(nav) = self.nav.as_mut() else {
            return Ok(());
        };
        nav.expanded = !nav.expanded;
        let snapshot = *nav;
        render(&mut self.dom, snapshot)
    }

    pub(crate) fn nav_collapse(&mut self) -> Result<()> {
        let Some(nav) = self.nav.as_mut() else {
            return Ok(());
        };
        nav.expanded = false;
        let snapshot = *nav;
        render(&mut self.dom, snapshot)
    }

    /// Document-level click: anything outside the navigation landmark
    /// collapses the menu.
    pub(crate) fn nav_outside_click(&mut self, target: NodeId) -> Result<()> {
        if self.nav.is_none() {
            return Ok(());
        }
        if self.dom.closest(target, "nav")?.is_some() {
            return Ok(());
        }
        self.nav_collapse()
    }
}
