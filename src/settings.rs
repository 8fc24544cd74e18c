use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::GradeResult;
use crate::saving::{KeyValueStore, THEME_KEY, load_cumulative_target, save_cumulative_target};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(raw: &str) -> Option<Theme> {
        match raw.trim() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// User preferences kept next to the grade table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub cumulative_target: Option<f64>,
}

impl Settings {
    /// Reads settings once; anything missing or unrecognised takes its default.
    pub fn load(store: &impl KeyValueStore) -> Settings {
        let theme = match store.get(THEME_KEY) {
            Ok(Some(raw)) => Theme::parse(&raw).unwrap_or_else(|| {
                warn!("unknown saved theme {:?}, using dark", raw);
                Theme::default()
            }),
            Ok(None) => Theme::default(),
            Err(err) => {
                warn!("could not read saved theme: {}", err);
                Theme::default()
            }
        };
        Settings {
            theme,
            cumulative_target: load_cumulative_target(store),
        }
    }

    pub fn persist(&self, store: &mut impl KeyValueStore) -> GradeResult<()> {
        store.set(THEME_KEY, self.theme.as_str())?;
        save_cumulative_target(store, self.cumulative_target)
    }
}
