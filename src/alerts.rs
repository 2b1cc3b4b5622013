use std::str::FromStr;

use crate::db::models::AlertRule;

/// Comparison operators accepted in `alerta.condicao`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
}

impl FromStr for Condition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Lte),
            ">=" => Ok(Self::Gte),
            "=" => Ok(Self::Eq),
            other => Err(anyhow::anyhow!("unknown alert condition: {other:?}")),
        }
    }
}

impl Condition {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Lt => value < threshold,
            Self::Gt => value > threshold,
            Self::Lte => value <= threshold,
            Self::Gte => value >= threshold,
            Self::Eq => value == threshold,
        }
    }
}

/// Whether `rule` fires for `value`. Rules with an unrecognised condition
/// never fire.
pub fn evaluate(rule: &AlertRule, value: f64) -> bool {
    rule.condition
        .parse::<Condition>()
        .map(|condition| condition.holds(value, rule.threshold))
        .unwrap_or(false)
}

/// Rules watching `parameter_json_name` whose condition holds for `value`.
pub fn triggered<'a>(
    rules: &'a [AlertRule],
    parameter_json_name: &'a str,
    value: f64,
) -> impl Iterator<Item = &'a AlertRule> + 'a {
    rules
        .iter()
        .filter(move |rule| rule.parameter_json_name == parameter_json_name)
        .filter(move |rule| evaluate(rule, value))
}
