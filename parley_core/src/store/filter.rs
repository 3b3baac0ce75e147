use crate::scope::Scope;
use serde::{Deserialize, Serialize};

/// Restricts which scopes a subscriber is told about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Filter {
    /// Every scope
    All,
    /// The network itself and every channel in it
    ByNetwork(String),
    /// Channels with this name, on any network
    ByChannelName(String),
    /// Exactly one scope
    ByChannel(Scope),
}

impl Default for Filter {
    fn default() -> Self {
        Self::All
    }
}

impl Filter {
    pub fn matches(&self, scope: &Scope) -> bool {
        match self {
            Self::All => true,
            Self::ByNetwork(network) => &scope.network == network,
            Self::ByChannelName(name) => scope.name() == Some(name.as_str()),
            Self::ByChannel(wanted) => wanted == scope,
        }
    }
}

/// Flag-based description of a filter, as supplied by a consumer.
///
/// Each set flag requires the corresponding field of a scope to equal that of
/// `scope`; with no flags set everything matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub match_network: bool,
    #[serde(default)]
    pub match_name: bool,
    pub scope: Scope,
}

impl From<FilterSpec> for Filter {
    fn from(spec: FilterSpec) -> Self {
        match (spec.match_network, spec.match_name) {
            (false, false) => Filter::All,
            (true, false) => Filter::ByNetwork(spec.scope.network),
            (false, true) => Filter::ByChannelName(spec.scope.name.unwrap_or_default()),
            (true, true) => Filter::ByChannel(spec.scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_filter_leaves_name_unconstrained() {
        let filter = Filter::ByNetwork("HamNet".to_string());
        assert!(filter.matches(&Scope::network("HamNet")));
        assert!(filter.matches(&Scope::channel("HamNet", "#other")));
        assert!(!filter.matches(&Scope::network("OtherNet")));
        assert!(!filter.matches(&Scope::channel("OtherNet", "#other")));
    }

    #[test]
    fn channel_filter_is_exact() {
        let filter = Filter::ByChannel(Scope::channel("HamNet", "#hamlet"));
        assert!(filter.matches(&Scope::channel("HamNet", "#hamlet")));
        assert!(!filter.matches(&Scope::channel("HamNet", "#other")));
        assert!(!filter.matches(&Scope::network("HamNet")));
    }

    #[test]
    fn from_flags() {
        let scope = Scope::channel("HamNet", "#hamlet");
        let spec = |match_network, match_name| FilterSpec {
            match_network,
            match_name,
            scope: scope.clone(),
        };

        assert_eq!(Filter::from(spec(false, false)), Filter::All);
        assert_eq!(
            Filter::from(spec(true, false)),
            Filter::ByNetwork("HamNet".to_string())
        );
        assert_eq!(
            Filter::from(spec(false, true)),
            Filter::ByChannelName("#hamlet".to_string())
        );
        assert_eq!(Filter::from(spec(true, true)), Filter::ByChannel(scope.clone()));

        let by_name = Filter::from(spec(false, true));
        assert!(by_name.matches(&Scope::channel("OtherNet", "#hamlet")));
        assert!(!by_name.matches(&Scope::network("HamNet")));
    }

    #[test]
    fn deserialize_tagged() {
        let filter: Filter =
            serde_json::from_str(r#"{"type": "by_network", "value": "HamNet"}"#).unwrap();
        assert_eq!(filter, Filter::ByNetwork("HamNet".to_string()));
    }
}
