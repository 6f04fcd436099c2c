//! Fixed reference data: service catalog, time slots, and service bundles.
//!
//! These tables are reference data, never mutated at runtime. Menu keys are
//! the literal digit tokens users reply with.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A bookable service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDef {
    /// Menu key ("1".."6").
    pub key: &'static str,
    pub name: &'static str,
    pub price: Decimal,
    /// Visit duration in minutes.
    pub duration_minutes: u32,
    pub category: &'static str,
}

/// The service catalog, in menu order.
pub static SERVICES: &[ServiceDef] = &[
    ServiceDef {
        key: "1",
        name: "Blood Pressure / Diabetes Check",
        price: dec!(500),
        duration_minutes: 30,
        category: "monitoring",
    },
    ServiceDef {
        key: "2",
        name: "Women's Health",
        price: dec!(800),
        duration_minutes: 45,
        category: "specialized",
    },
    ServiceDef {
        key: "3",
        name: "Child Check-Up",
        price: dec!(600),
        duration_minutes: 30,
        category: "pediatric",
    },
    ServiceDef {
        key: "4",
        name: "Mental Health",
        price: dec!(1000),
        duration_minutes: 60,
        category: "specialized",
    },
    ServiceDef {
        key: "5",
        name: "General Consultation",
        price: dec!(400),
        duration_minutes: 25,
        category: "general",
    },
    ServiceDef {
        key: "6",
        name: "Other (we'll ask more)",
        price: dec!(500),
        duration_minutes: 30,
        category: "general",
    },
];

/// Look up a service by its menu key.
pub fn service_by_key(key: &str) -> Option<&'static ServiceDef> {
    SERVICES.iter().find(|s| s.key == key)
}

/// A bookable time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlotDef {
    /// Menu key ("1".."3").
    pub key: &'static str,
    pub label: &'static str,
    /// Local start time, "HH:MM".
    pub start: &'static str,
    /// Local end time, "HH:MM".
    pub end: &'static str,
}

/// The time slot table, in menu order.
pub static TIME_SLOTS: &[TimeSlotDef] = &[
    TimeSlotDef {
        key: "1",
        label: "Morning (9-11 AM)",
        start: "09:00",
        end: "11:00",
    },
    TimeSlotDef {
        key: "2",
        label: "Midday (11 AM-1 PM)",
        start: "11:00",
        end: "13:00",
    },
    TimeSlotDef {
        key: "3",
        label: "Afternoon (2-4 PM)",
        start: "14:00",
        end: "16:00",
    },
];

/// Look up a time slot by its menu key.
pub fn slot_by_key(key: &str) -> Option<&'static TimeSlotDef> {
    TIME_SLOTS.iter().find(|s| s.key == key)
}

impl TimeSlotDef {
    /// Parse the slot's local start time.
    pub fn start_time(&self) -> NaiveTime {
        parse_hhmm(self.start)
    }

    /// Parse the slot's local end time.
    pub fn end_time(&self) -> NaiveTime {
        parse_hhmm(self.end)
    }
}

fn parse_hhmm(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap_or(NaiveTime::MIN)
}

/// Accepted payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// M-Pesa style STK push.
    MobileMoney,
    /// Insurance card (NHIF).
    Insurance,
    /// In-app wallet keyed by phone number.
    Wallet,
}

impl PaymentMethod {
    /// Look up a method by its menu key ("1".."3").
    pub fn by_key(key: &str) -> Option<Self> {
        match key {
            "1" => Some(Self::MobileMoney),
            "2" => Some(Self::Insurance),
            "3" => Some(Self::Wallet),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MobileMoney => "M-PESA",
            Self::Insurance => "NHIF",
            Self::Wallet => "Wallet",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MobileMoney => "mobile_money",
            Self::Insurance => "insurance",
            Self::Wallet => "wallet",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_money" => Ok(Self::MobileMoney),
            "insurance" => Ok(Self::Insurance),
            "wallet" => Ok(Self::Wallet),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// A discounted bundle of services recommended from the health profile.
#[derive(Debug, Clone, Copy)]
pub struct BundleDef {
    pub key: &'static str,
    pub name: &'static str,
    pub services: &'static [&'static str],
    pub discount_percent: u32,
    pub description: &'static str,
}

pub static BUNDLES: &[BundleDef] = &[
    BundleDef {
        key: "diabetes_care",
        name: "Complete Diabetes Care Package",
        services: &["Blood Pressure / Diabetes Check", "General Consultation"],
        discount_percent: 20,
        description: "Comprehensive diabetes monitoring and consultation",
    },
    BundleDef {
        key: "women_health",
        name: "Women's Health Plus",
        services: &["Women's Health", "General Consultation"],
        discount_percent: 15,
        description: "Complete women's health screening and consultation",
    },
    BundleDef {
        key: "family_care",
        name: "Family Health Package",
        services: &["Child Check-Up", "General Consultation"],
        discount_percent: 25,
        description: "Family health checkup package",
    },
];

/// Health tips keyed by condition, used by the digest and greeting
/// recommendations.
pub static HEALTH_TIPS: &[(&str, &[&str])] = &[
    (
        "UTI",
        &[
            "Drink 8-10 glasses of water daily",
            "Avoid caffeine and alcohol",
            "Maintain good hygiene practices",
            "Eat cranberries or take supplements",
        ],
    ),
    (
        "diabetes",
        &[
            "Monitor blood sugar regularly",
            "Follow a balanced diet plan",
            "Exercise for 30 minutes daily",
            "Take medications as prescribed",
        ],
    ),
    (
        "hypertension",
        &[
            "Reduce salt intake",
            "Exercise regularly",
            "Get 7-8 hours of sleep",
            "Practice stress management",
        ],
    ),
    (
        "mental_health",
        &[
            "Practice mindfulness daily",
            "Stay connected with loved ones",
            "Get regular sunlight exposure",
            "Reach out for professional help",
        ],
    ),
];

/// Tips for a condition, if any are known.
pub fn tips_for(condition: &str) -> Option<&'static [&'static str]> {
    HEALTH_TIPS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(condition))
        .map(|(_, tips)| *tips)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_lookup_by_key() {
        let svc = service_by_key("5").unwrap();
        assert_eq!(svc.name, "General Consultation");
        assert_eq!(svc.price, dec!(400));
        assert_eq!(svc.duration_minutes, 25);
    }

    #[test]
    fn service_lookup_out_of_range() {
        assert!(service_by_key("9").is_none());
        assert!(service_by_key("0").is_none());
        assert!(service_by_key("book").is_none());
    }

    #[test]
    fn slot_lookup_and_times() {
        let slot = slot_by_key("2").unwrap();
        assert_eq!(slot.label, "Midday (11 AM-1 PM)");
        assert_eq!(slot.start_time().format("%H:%M").to_string(), "11:00");
        assert_eq!(slot.end_time().format("%H:%M").to_string(), "13:00");
    }

    #[test]
    fn payment_method_keys() {
        assert_eq!(PaymentMethod::by_key("1"), Some(PaymentMethod::MobileMoney));
        assert_eq!(PaymentMethod::by_key("2"), Some(PaymentMethod::Insurance));
        assert_eq!(PaymentMethod::by_key("3"), Some(PaymentMethod::Wallet));
        assert_eq!(PaymentMethod::by_key("4"), None);
    }

    #[test]
    fn payment_method_display_roundtrip() {
        for method in [
            PaymentMethod::MobileMoney,
            PaymentMethod::Insurance,
            PaymentMethod::Wallet,
        ] {
            let s = method.to_string();
            let parsed: PaymentMethod = s.parse().unwrap();
            assert_eq!(parsed, method);
        }
    }

    #[test]
    fn tips_lookup_case_insensitive() {
        assert!(tips_for("uti").is_some());
        assert!(tips_for("Diabetes").is_some());
        assert!(tips_for("unknown").is_none());
    }
}
