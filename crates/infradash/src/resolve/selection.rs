use tracing::{info, instrument};

use super::{MatchTier, MunicipalityNames};
use crate::config::ResolverConfig;

/// What happened when free text was applied to a [`SelectionState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Blank input, nothing looked up
    Unchanged,
    /// The selection now points at this municipality
    Selected(String),
    /// Several candidates matched; the previous selection is kept
    Ambiguous(Vec<String>),
    /// Nothing matched; the previous selection is kept
    NotFound(String),
}

impl SelectionOutcome {
    /// Message shown to the user, if any. `showing` is the municipality the
    /// page ends up displaying.
    #[must_use]
    pub fn message(&self, showing: &str) -> Option<String> {
        match self {
            Self::Unchanged => None,
            Self::Selected(name) => Some(format!("Highlighted municipality: {name}")),
            Self::Ambiguous(candidates) => Some(format!(
                "Found multiple matches: {} (showing: {showing})",
                candidates.join(", ")
            )),
            Self::NotFound(_) => Some(format!(
                "No match found. Try typing part of the name or removing accents. (showing: {showing})"
            )),
        }
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }
}

/// The currently selected municipality of a dashboard session.
///
/// Starts at the configured default and only changes when input resolves to
/// exactly one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    current: String,
}

impl SelectionState {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: initial.into(),
        }
    }

    #[must_use]
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Resolve `input` and update the selection on a unique match.
    #[instrument(name = "Apply selection", skip(self, names, config), fields(current = %self.current), level = "debug")]
    pub fn apply(
        &mut self,
        input: &str,
        names: &MunicipalityNames,
        config: &ResolverConfig,
    ) -> SelectionOutcome {
        if input.trim().is_empty() {
            return SelectionOutcome::Unchanged;
        }

        let resolution = names.resolve_with_tier(input, config);
        let mut matches = resolution.names;
        let outcome = match matches.len() {
            0 => SelectionOutcome::NotFound(input.trim().to_string()),
            1 => SelectionOutcome::Selected(matches.swap_remove(0)),
            _ if config.auto_apply_top_fuzzy && resolution.tier == MatchTier::Fuzzy => {
                SelectionOutcome::Selected(matches.swap_remove(0))
            }
            _ => SelectionOutcome::Ambiguous(matches),
        };
        if let SelectionOutcome::Selected(name) = &outcome {
            info!(from = %self.current, to = %name, "Municipality selected");
            self.current.clone_from(name);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> MunicipalityNames {
        MunicipalityNames::new(["Veliko Gradište", "Niš", "Šabac", "Novi Sad"])
    }

    #[test]
    fn test_unique_match_selects() {
        let mut state = SelectionState::new("Veliko Gradište");
        let outcome = state.apply("nis", &names(), &ResolverConfig::default());
        assert_eq!(outcome, SelectionOutcome::Selected("Niš".into()));
        assert_eq!(state.current(), "Niš");
    }

    #[test]
    fn test_blank_input_keeps_state() {
        let mut state = SelectionState::new("Niš");
        for input in ["", "   ", "\t"] {
            assert_eq!(
                state.apply(input, &names(), &ResolverConfig::default()),
                SelectionOutcome::Unchanged
            );
        }
        assert_eq!(state.current(), "Niš");
    }

    #[test]
    fn test_not_found_keeps_previous() {
        let mut state = SelectionState::new("Niš");
        let outcome = state.apply("xyz123", &names(), &ResolverConfig::default());
        assert_eq!(outcome, SelectionOutcome::NotFound("xyz123".into()));
        assert_eq!(state.current(), "Niš");
        assert_eq!(
            outcome.message(state.current()).unwrap(),
            "No match found. Try typing part of the name or removing accents. (showing: Niš)"
        );
    }

    #[test]
    fn test_ambiguous_keeps_previous_and_lists_candidates() {
        let mut state = SelectionState::new("Niš");
        let outcome = state.apply("sa", &names(), &ResolverConfig::default());
        assert_eq!(
            outcome,
            SelectionOutcome::Ambiguous(vec!["Šabac".into(), "Novi Sad".into()])
        );
        assert_eq!(state.current(), "Niš");
        assert_eq!(
            outcome.message(state.current()).unwrap(),
            "Found multiple matches: Šabac, Novi Sad (showing: Niš)"
        );
    }

    #[test]
    fn test_auto_apply_only_for_fuzzy_tier() {
        let index = MunicipalityNames::new(["Bor", "Bar", "Novi Sad", "Šabac"]);
        let config = ResolverConfig {
            auto_apply_top_fuzzy: true,
            ..ResolverConfig::default()
        };
        let mut state = SelectionState::new("Šabac");

        assert_eq!(
            state.apply("bxr", &index, &config),
            SelectionOutcome::Selected("Bor".into())
        );
        assert!(matches!(
            state.apply("sa", &index, &config),
            SelectionOutcome::Ambiguous(_)
        ));
        assert_eq!(state.current(), "Bor");
    }
}
