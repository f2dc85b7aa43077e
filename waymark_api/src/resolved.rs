use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use super::tour::StopLink;

/// Why a stop could not be placed in the working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokenReason {
    /// The stop references a repository with no binding in the tour.
    RepositoryUnbound,
    /// No filesystem root is mapped for the stop's repository.
    RepositoryUnmapped,
    /// The version-control backend failed while diffing the repository.
    RepositoryUnavailable,
    /// The stop's file does not exist in the working copy.
    FileNotFound,
    /// The stop's tracked line cannot be mapped into the working copy.
    LineNotFound,
}

/// Outcome of positioning one stop against the live working copy.
///
/// Recomputed fresh on every resolution pass; nothing persists this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolvedStop {
    /// The stop's file and line exist in the working copy.
    #[serde(rename_all = "camelCase")]
    Located {
        /// Stop heading.
        title: String,
        /// Stop body.
        body: String,
        /// Absolute path of the file in the working copy.
        absolute_path: Utf8PathBuf,
        /// 1-based line in the working copy.
        line: u32,
        /// References into other tours.
        #[serde(default)]
        child_stops: Vec<StopLink>,
    },
    /// The stop could not be placed; the annotation text is still usable.
    #[serde(rename_all = "camelCase")]
    Broken {
        /// Stop heading.
        title: String,
        /// Stop body.
        body: String,
        /// Every reason the stop failed to place.
        reasons: Vec<BrokenReason>,
        /// References into other tours.
        #[serde(default)]
        child_stops: Vec<StopLink>,
    },
}

impl ResolvedStop {
    /// Stop heading, regardless of placement outcome.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Located { title, .. } | Self::Broken { title, .. } => title,
        }
    }

    /// True when the stop placed successfully.
    #[must_use]
    pub fn is_located(&self) -> bool {
        matches!(self, Self::Located { .. })
    }

    /// True when the stop failed to place.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn located_round_trip() {
        let stop = ResolvedStop::Located {
            title: "Entry point".into(),
            body: "Where tokens come in.".into(),
            absolute_path: "/work/parser/src/lexer.rs".into(),
            line: 42,
            child_stops: vec![],
        };

        let json = serde_json::to_string(&stop).expect("serialize resolved stop");
        assert!(json.contains("\"status\":\"located\""));
        assert!(json.contains("\"absolutePath\""));
        let decoded: ResolvedStop = serde_json::from_str(&json).expect("deserialize resolved stop");
        assert_eq!(stop, decoded);
        assert!(decoded.is_located());
    }

    #[test]
    fn broken_carries_reasons() {
        let stop = ResolvedStop::Broken {
            title: "Gone".into(),
            body: String::new(),
            reasons: vec![BrokenReason::LineNotFound],
            child_stops: vec![],
        };

        let json = serde_json::to_string(&stop).expect("serialize broken stop");
        assert!(json.contains("\"status\":\"broken\""));
        assert!(json.contains("\"line_not_found\""));
        assert!(stop.is_broken());
        assert_eq!(stop.title(), "Gone");
    }
}
