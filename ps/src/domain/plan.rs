//! Typed, read-only view over a plan snapshot
//!
//! The server's plan payload is stored verbatim; this view only pulls out what
//! the CLI renders. Missing or oddly-typed fields become `None`/empty rather
//! than failing, since partial plans arrive mid-generation.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// What a step is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Visit,
    Activity,
    Transport,
    #[default]
    Other,
}

impl StepKind {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "visit" | "sightseeing" => Self::Visit,
            "activity" => Self::Activity,
            "transport" | "transportation" | "travel" => Self::Transport,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Visit => "visit",
            Self::Activity => "activity",
            Self::Transport => "transport",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Where a step happens
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One entry in a day
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Step {
    pub kind: StepKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub cost: Option<f64>,
    pub location: Option<Location>,
}

/// One day of the itinerary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Day {
    pub number: Option<u32>,
    pub title: Option<String>,
    pub steps: Vec<Step>,
}

/// A travel plan as far as it has been generated
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    pub title: Option<String>,
    pub days: Vec<Day>,
}

impl Plan {
    /// Build the view from a raw snapshot
    pub fn from_snapshot(snapshot: &Value) -> Self {
        debug!("Plan::from_snapshot: called");
        let days = snapshot
            .get("days")
            .and_then(Value::as_array)
            .map(|days| days.iter().map(Day::from_value).collect())
            .unwrap_or_default();

        Self {
            title: text_field(snapshot, &["title", "name"]),
            days,
        }
    }

    pub fn step_count(&self) -> usize {
        self.days.iter().map(|d| d.steps.len()).sum()
    }

    /// Sum of every step cost that is known
    pub fn total_cost(&self) -> Option<f64> {
        let costs: Vec<f64> = self.days.iter().flat_map(|d| &d.steps).filter_map(|s| s.cost).collect();
        if costs.is_empty() { None } else { Some(costs.iter().sum()) }
    }

    /// Human-readable outline for terminal output
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title.as_deref().unwrap_or("(untitled plan)"));

        for (idx, day) in self.days.iter().enumerate() {
            let number = day.number.unwrap_or(idx as u32 + 1);
            match &day.title {
                Some(title) => {
                    let _ = writeln!(out, "  Day {}: {}", number, title);
                }
                None => {
                    let _ = writeln!(out, "  Day {}", number);
                }
            }
            for step in &day.steps {
                let mut line = format!("    - [{}] {}", step.kind, step.title.as_deref().unwrap_or("(step)"));
                if let Some(name) = step.location.as_ref().and_then(|l| l.name.as_deref()) {
                    let _ = write!(line, " @ {}", name);
                }
                if let Some(cost) = step.cost {
                    let _ = write!(line, " ({:.2})", cost);
                }
                let _ = writeln!(out, "{}", line);
            }
        }

        if let Some(total) = self.total_cost() {
            let _ = writeln!(out, "  Total cost: {:.2}", total);
        }
        out
    }
}

impl Day {
    fn from_value(value: &Value) -> Self {
        let steps = value
            .get("steps")
            .and_then(Value::as_array)
            .map(|steps| steps.iter().map(Step::from_value).collect())
            .unwrap_or_default();

        Self {
            number: value
                .get("day")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            title: text_field(value, &["title", "theme"]),
            steps,
        }
    }
}

impl Step {
    fn from_value(value: &Value) -> Self {
        Self {
            kind: value
                .get("type")
                .or_else(|| value.get("category"))
                .and_then(Value::as_str)
                .map(StepKind::parse)
                .unwrap_or_default(),
            title: text_field(value, &["title", "name"]),
            description: text_field(value, &["description"]),
            cost: value.get("cost").and_then(number_field),
            location: value.get("location").and_then(Location::from_value),
        }
    }
}

impl Location {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) if !name.is_empty() => Some(Self {
                name: Some(name.clone()),
                ..Self::default()
            }),
            Value::Object(_) => Some(Self {
                name: text_field(value, &["name", "address"]),
                latitude: value.get("latitude").or_else(|| value.get("lat")).and_then(number_field),
                longitude: value
                    .get("longitude")
                    .or_else(|| value.get("lng"))
                    .or_else(|| value.get("lon"))
                    .and_then(number_field),
            }),
            _ => None,
        }
    }
}

fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers, or strings like "1500" / "NPR 1,500"
fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            digits.parse().ok()
        }
        _ => None,
    }
}
