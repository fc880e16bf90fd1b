use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use slotpilot_core_types::FieldName;

use crate::errors::SettingsError;

/// Option index per form field plus the auto-submit switch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingSettings {
    pub category_index: usize,
    pub form_location_index: usize,
    pub visa_type_index: usize,
    pub visa_sub_type_index: usize,
    pub mission_index: usize,
    pub auto_submit: bool,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            category_index: 0,
            form_location_index: 0,
            visa_type_index: 1,
            visa_sub_type_index: 1,
            mission_index: 0,
            auto_submit: false,
        }
    }
}

impl BookingSettings {
    pub fn index_for(&self, field: FieldName) -> usize {
        match field {
            FieldName::Category => self.category_index,
            FieldName::Location => self.form_location_index,
            FieldName::VisaType => self.visa_type_index,
            FieldName::VisaSubType => self.visa_sub_type_index,
            FieldName::Mission => self.mission_index,
        }
    }

    pub fn set_index(&mut self, field: FieldName, index: usize) {
        let slot = match field {
            FieldName::Category => &mut self.category_index,
            FieldName::Location => &mut self.form_location_index,
            FieldName::VisaType => &mut self.visa_type_index,
            FieldName::VisaSubType => &mut self.visa_sub_type_index,
            FieldName::Mission => &mut self.mission_index,
        };
        *slot = index;
    }

    pub fn indices(&self) -> BTreeMap<FieldName, usize> {
        FieldName::ALL
            .into_iter()
            .map(|field| (field, self.index_for(field)))
            .collect()
    }
}

/// Partial update; `None` leaves a value untouched.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub category_index: Option<usize>,
    pub form_location_index: Option<usize>,
    pub visa_type_index: Option<usize>,
    pub visa_sub_type_index: Option<usize>,
    pub mission_index: Option<usize>,
    pub auto_submit: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }

    pub fn apply(&self, settings: &mut BookingSettings) {
        let pairs = [
            (FieldName::Category, self.category_index),
            (FieldName::Location, self.form_location_index),
            (FieldName::VisaType, self.visa_type_index),
            (FieldName::VisaSubType, self.visa_sub_type_index),
            (FieldName::Mission, self.mission_index),
        ];
        for (field, value) in pairs {
            if let Some(index) = value {
                settings.set_index(field, index);
            }
        }
        if let Some(auto_submit) = self.auto_submit {
            settings.auto_submit = auto_submit;
        }
    }

    /// Parses one `key=value` as typed on the command line.
    ///
    /// Keys are the persisted camelCase names (`visaTypeIndex`, `autoSubmit`).
    pub fn from_pair(key: &str, value: &str) -> Result<Self, SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let mut patch = SettingsPatch::default();
        if key == "autoSubmit" {
            patch.auto_submit = Some(value.parse().map_err(|_| invalid())?);
            return Ok(patch);
        }
        let index: usize = value.parse().map_err(|_| invalid())?;
        match key {
            "categoryIndex" => patch.category_index = Some(index),
            "formLocationIndex" => patch.form_location_index = Some(index),
            "visaTypeIndex" => patch.visa_type_index = Some(index),
            "visaSubTypeIndex" => patch.visa_sub_type_index = Some(index),
            "missionIndex" => patch.mission_index = Some(index),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(patch)
    }
}

/// Everything kept across page loads.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub booking_config: BookingSettings,
    pub image_url: Option<String>,
    pub run_enabled: bool,
    /// Unix epoch milliseconds of the last login click that went through.
    pub last_login_click_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_first_run_values() {
        let settings = BookingSettings::default();
        assert_eq!(settings.index_for(FieldName::VisaType), 1);
        assert_eq!(settings.index_for(FieldName::VisaSubType), 1);
        assert_eq!(settings.index_for(FieldName::Mission), 0);
        assert!(!settings.auto_submit);
    }

    #[test]
    fn persisted_keys_are_camel_case() {
        let json = serde_json::to_value(PersistedState::default()).unwrap();
        assert!(json["bookingConfig"]["formLocationIndex"].is_number());
        assert!(json["runEnabled"].is_boolean());
        assert!(json.get("lastLoginClickMs").is_some());
    }

    #[test]
    fn patch_from_pair_validates() {
        let mut settings = BookingSettings::default();
        SettingsPatch::from_pair("missionIndex", "3")
            .unwrap()
            .apply(&mut settings);
        SettingsPatch::from_pair("autoSubmit", "true")
            .unwrap()
            .apply(&mut settings);
        assert_eq!(settings.mission_index, 3);
        assert!(settings.auto_submit);
        assert!(matches!(
            SettingsPatch::from_pair("missionIndex", "-1"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            SettingsPatch::from_pair("colour", "1"),
            Err(SettingsError::UnknownKey(_))
        ));
    }
}
