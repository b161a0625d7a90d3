//! Room settings, their defaults, and partial overrides sent at creation.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, QuestionKind};

/// One value per question kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerKind<T> {
    pub single: T,
    pub multi: T,
    pub text: T,
    pub poll: T,
    pub buzzer: T,
}

impl<T: Copy> PerKind<T> {
    pub fn get(&self, kind: QuestionKind) -> T {
        match kind {
            QuestionKind::Single => self.single,
            QuestionKind::Multi => self.multi,
            QuestionKind::Text => self.text,
            QuestionKind::Poll => self.poll,
            QuestionKind::Buzzer => self.buzzer,
        }
    }
}

/// Settings fixed for the lifetime of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    /// A second answer replaces the first instead of being rejected.
    pub allow_answer_change: bool,
    pub speed_bonus: bool,
    pub streak_bonus: bool,
    pub team_mode: bool,
    /// Buzzer window capacity when `startBuzzer` does not name one.
    pub buzzer_top_n: u32,
    /// Seconds, used when a question does not carry its own limit.
    pub default_time_limits: PerKind<u32>,
    /// Used when a question does not carry its own point value.
    pub points: PerKind<u32>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            allow_answer_change: true,
            speed_bonus: false,
            streak_bonus: false,
            team_mode: false,
            buzzer_top_n: 1,
            default_time_limits: PerKind { single: 20, multi: 30, text: 30, poll: 15, buzzer: 10 },
            points: PerKind { single: 100, multi: 100, text: 100, poll: 50, buzzer: 200 },
        }
    }
}

/// Per-kind overrides; absent kinds keep their default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerKindOverrides {
    pub single: Option<u32>,
    pub multi: Option<u32>,
    pub text: Option<u32>,
    pub poll: Option<u32>,
    pub buzzer: Option<u32>,
}

impl PerKindOverrides {
    fn apply(&self, base: &mut PerKind<u32>) {
        let pairs = [
            (self.single, &mut base.single),
            (self.multi, &mut base.multi),
            (self.text, &mut base.text),
            (self.poll, &mut base.poll),
            (self.buzzer, &mut base.buzzer),
        ];
        for (value, slot) in pairs {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }

    fn check_range(&self, field: &str, min: u32, max: u32) -> Result<(), ProtocolError> {
        let values = [self.single, self.multi, self.text, self.poll, self.buzzer];
        for value in values.into_iter().flatten() {
            if !(min..=max).contains(&value) {
                return Err(ProtocolError::Validation(format!(
                    "{field} must be between {min} and {max}, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Partial settings as supplied with `createRoom`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsOverrides {
    pub allow_answer_change: Option<bool>,
    pub speed_bonus: Option<bool>,
    pub streak_bonus: Option<bool>,
    pub team_mode: Option<bool>,
    pub buzzer_top_n: Option<u32>,
    pub default_time_limits: Option<PerKindOverrides>,
    pub points: Option<PerKindOverrides>,
}

impl SettingsOverrides {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if let Some(n) = self.buzzer_top_n {
            crate::validate::check_top_n(n)?;
        }
        if let Some(limits) = &self.default_time_limits {
            limits.check_range("defaultTimeLimits", 5, 300)?;
        }
        if let Some(points) = &self.points {
            points.check_range("points", 1, 1000)?;
        }
        Ok(())
    }
}

impl RoomSettings {
    /// Applies `overrides` field by field on top of the defaults.
    pub fn with_overrides(overrides: &SettingsOverrides) -> Self {
        let mut settings = Self::default();
        if let Some(v) = overrides.allow_answer_change {
            settings.allow_answer_change = v;
        }
        if let Some(v) = overrides.speed_bonus {
            settings.speed_bonus = v;
        }
        if let Some(v) = overrides.streak_bonus {
            settings.streak_bonus = v;
        }
        if let Some(v) = overrides.team_mode {
            settings.team_mode = v;
        }
        if let Some(v) = overrides.buzzer_top_n {
            settings.buzzer_top_n = v;
        }
        if let Some(limits) = &overrides.default_time_limits {
            limits.apply(&mut settings.default_time_limits);
        }
        if let Some(points) = &overrides.points {
            points.apply(&mut settings.points);
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = RoomSettings::default();
        assert!(s.allow_answer_change);
        assert!(!s.speed_bonus && !s.streak_bonus && !s.team_mode);
        assert_eq!(s.buzzer_top_n, 1);
        assert_eq!(s.default_time_limits.get(QuestionKind::Poll), 15);
        assert_eq!(s.points.get(QuestionKind::Buzzer), 200);
    }

    #[test]
    fn test_overrides_merge_per_field() {
        let overrides: SettingsOverrides = serde_json::from_str(
            r#"{"speedBonus": true, "defaultTimeLimits": {"single": 45}, "points": {"poll": 10}}"#,
        )
        .unwrap();
        let s = RoomSettings::with_overrides(&overrides);

        assert!(s.speed_bonus);
        assert!(s.allow_answer_change, "untouched flags keep defaults");
        assert_eq!(s.default_time_limits.single, 45);
        assert_eq!(s.default_time_limits.multi, 30);
        assert_eq!(s.points.poll, 10);
        assert_eq!(s.points.single, 100);
    }

    #[test]
    fn test_overrides_out_of_range_rejected() {
        let too_short = SettingsOverrides {
            default_time_limits: Some(PerKindOverrides { text: Some(4), ..Default::default() }),
            ..Default::default()
        };
        assert!(too_short.validate().is_err());

        let too_many_points = SettingsOverrides {
            points: Some(PerKindOverrides { single: Some(1001), ..Default::default() }),
            ..Default::default()
        };
        assert!(too_many_points.validate().is_err());

        let zero_top_n = SettingsOverrides { buzzer_top_n: Some(0), ..Default::default() };
        assert!(zero_top_n.validate().is_err());
    }

    #[test]
    fn test_settings_wire_names() {
        let json = serde_json::to_value(RoomSettings::default()).unwrap();
        assert_eq!(json["allowAnswerChange"], true);
        assert_eq!(json["buzzerTopN"], 1);
        assert_eq!(json["defaultTimeLimits"]["buzzer"], 10);
        assert_eq!(json["points"]["single"], 100);
    }
}
