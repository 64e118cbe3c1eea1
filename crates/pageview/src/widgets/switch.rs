use crate::locator::{quote, Locator, Selector};
use crate::result::{ViewError, ViewResult};
use crate::version::VersionPick;
use crate::widget::{Node, Placeholder, Widget};
use serde_json::Value;

/// `bootstrap-switch` wrapping a checkbox input.
///
/// The input itself is hidden; the state is toggled by clicking the wrapper.
#[derive(Debug)]
pub struct BootstrapSwitch {
    node: Node,
    name: Option<VersionPick<String>>,
}

impl BootstrapSwitch {
    /// Locator of the switch input by `id`
    #[must_use]
    pub fn id_locator(id: &str) -> String {
        format!(".//div/input[@id={}]", quote(id))
    }

    /// Locator of the switch input by `name`
    #[must_use]
    pub fn name_locator(name: &str) -> String {
        format!(".//div/input[@name={}]", quote(name))
    }

    /// Switch by input `id`
    pub fn by_id(id: &str) -> Placeholder<Self> {
        Placeholder::located(Self::id_locator(id), |node| Self { node, name: None })
    }

    /// Switch by input `name`
    pub fn by_name(name: &str) -> Placeholder<Self> {
        Self::by_name_pick(VersionPick::lowest(name))
    }

    /// Switch whose input `name` depends on the product version
    pub fn by_name_pick(names: VersionPick<&str>) -> Placeholder<Self> {
        let locator = Locator::from(names.clone().map(|name| Selector::parse(&Self::name_locator(name))));
        let owned = names.map(ToString::to_string);
        Placeholder::located(locator, move |node| Self {
            node,
            name: Some(owned),
        })
    }

    /// Input `name` in effect for the running product version
    pub fn resolved_name(&self) -> ViewResult<Option<String>> {
        match &self.name {
            Some(pick) => Ok(Some(pick.resolve(self.node.browser())?.clone())),
            None => Ok(None),
        }
    }

    /// Whether the switch is on
    pub fn is_on(&self) -> ViewResult<bool> {
        self.node.is_selected()
    }
}

impl Widget for BootstrapSwitch {
    fn node(&self) -> &Node {
        &self.node
    }

    fn read(&self) -> ViewResult<Value> {
        Ok(Value::Bool(self.is_on()?))
    }

    fn fill_value(&self, value: &Value) -> ViewResult<bool> {
        let Value::Bool(wanted) = value else {
            return Err(ViewError::invalid(self.node.path(), format!("expected a boolean, got {value}")));
        };
        if self.is_on()? == *wanted {
            return Ok(false);
        }
        tracing::info!(widget = %self.node.path(), on = wanted, "toggle switch");
        let wrapper = self.node.find("./..")?;
        self.node.browser().click(&wrapper)?;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::MockElement;
    use crate::widget::Bind;
    use crate::widgets::testing::setup_at;

    fn quadicons() -> VersionPick<&'static str> {
        VersionPick::lowest("quadicons_ems").since("5.10", "quadicons_infra_manager")
    }

    #[test]
    fn test_version_picked_name() {
        for (version, name) in [("5.9.3", "quadicons_ems"), ("5.10.1", "quadicons_infra_manager")] {
            let (mock, _browser, root) = setup_at(version);
            let input = mock.add(
                None,
                &BootstrapSwitch::name_locator(name),
                MockElement::input("checkbox").hidden(),
            );
            let wrapper = mock.add(Some(&input), "./..", MockElement::new("div"));
            let toggled = input.clone();
            mock.on_click(&wrapper, move |m| m.set_selected(&toggled, !m.get_selected(&toggled)));

            let switch = BootstrapSwitch::by_name_pick(quadicons()).bind(&root, "infra_provider");
            assert_eq!(switch.resolved_name().unwrap().as_deref(), Some(name));
            assert_eq!(switch.read().unwrap(), Value::Bool(false));
            assert!(switch.fill(&Value::Bool(true)).unwrap());
            assert!(mock.get_selected(&input));
            assert!(!switch.fill(&Value::Bool(true)).unwrap());
        }
    }

    #[test]
    fn test_by_id_rejects_non_boolean() {
        let (mock, _browser, root) = setup_at("5.10.1");
        mock.add(None, &BootstrapSwitch::id_locator("ssl"), MockElement::input("checkbox"));
        let switch = BootstrapSwitch::by_id("ssl").bind(&root, "ssl");
        assert_eq!(switch.resolved_name().unwrap(), None);
        assert!(matches!(switch.fill(&Value::from(1)), Err(ViewError::InvalidValue { .. })));
    }
}
