//! Links between services and their impairment parameters.

use serde::{Deserialize, Serialize};

use super::types::{InterfaceId, ServiceId};

/// Physical characteristics of a link.
///
/// Delays are in milliseconds. Loss and the correlations are fractions in
/// `[0, 1]`. `rate` is a `tc` rate string such as `100mbit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkProperties {
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub delay_variation: f64,
    #[serde(default)]
    pub delay_correlation: f64,
    #[serde(default)]
    pub loss: f64,
    #[serde(default)]
    pub loss_correlation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
}

impl LinkProperties {
    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_delay_variation(mut self, variation: f64, correlation: f64) -> Self {
        self.delay_variation = variation;
        self.delay_correlation = correlation;
        self
    }

    pub fn with_loss(mut self, loss: f64, correlation: f64) -> Self {
        self.loss = loss;
        self.loss_correlation = correlation;
        self
    }

    pub fn with_rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = Some(rate.into());
        self
    }

    /// True when the link needs traffic shaping at all.
    pub fn is_shaped(&self) -> bool {
        self.delay > 0.0 || self.delay_variation > 0.0 || self.loss > 0.0 || self.rate.is_some()
    }

    /// Check the ranges of every parameter.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("delay", self.delay), ("delay_variation", self.delay_variation)] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number of milliseconds, got {}", name, value));
            }
        }
        for (name, value) in [
            ("delay_correlation", self.delay_correlation),
            ("loss", self.loss),
            ("loss_correlation", self.loss_correlation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if let Some(rate) = &self.rate {
            if rate.is_empty() || !rate.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(format!("rate must look like `100mbit`, got `{}`", rate));
            }
        }
        Ok(())
    }
}

/// A connection between two service interfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub(crate) service1: ServiceId,
    pub(crate) service2: ServiceId,
    pub(crate) interface1: InterfaceId,
    pub(crate) interface2: InterfaceId,
    pub(crate) properties: LinkProperties,
}

impl Link {
    pub fn service1(&self) -> ServiceId {
        self.service1
    }

    pub fn service2(&self) -> ServiceId {
        self.service2
    }

    pub fn interface1(&self) -> InterfaceId {
        self.interface1
    }

    pub fn interface2(&self) -> InterfaceId {
        self.interface2
    }

    pub fn properties(&self) -> &LinkProperties {
        &self.properties
    }

    /// Both ends use the same interface.
    pub fn is_loopback(&self) -> bool {
        self.interface1 == self.interface2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_properties_are_unshaped() {
        let props = LinkProperties::default();
        assert!(!props.is_shaped());
        assert!(props.validate().is_ok());
    }

    #[test]
    fn test_property_ranges() {
        assert!(LinkProperties::default().with_delay(-1.0).validate().is_err());
        assert!(LinkProperties::default().with_loss(1.5, 0.0).validate().is_err());
        assert!(LinkProperties::default().with_loss(0.5, -0.1).validate().is_err());
        assert!(LinkProperties::default().with_delay_variation(2.0, 2.0).validate().is_err());
        assert!(LinkProperties::default().with_rate("fast").validate().is_err());
        assert!(LinkProperties::default().with_delay(f64::NAN).validate().is_err());

        let props = LinkProperties::default()
            .with_delay(10.0)
            .with_delay_variation(2.0, 0.25)
            .with_loss(0.01, 0.5)
            .with_rate("100mbit");
        assert!(props.validate().is_ok());
        assert!(props.is_shaped());
    }
}
