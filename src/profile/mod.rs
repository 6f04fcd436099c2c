//! Health profiles and heuristic intake extraction.
//!
//! A profile is one per user identity, independent of any single session.
//! It is mutated incrementally by completed bookings and prediagnosis text
//! parsing, and never deleted.
//!
//! The extraction here is heuristic, not authoritative: it feeds
//! recommendations and never gates booking completion.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::{BUNDLES, BundleDef, tips_for};

/// Notification preference flags, all on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    pub medication: bool,
    pub follow_up: bool,
    pub health_tips: bool,
    pub loyalty: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            medication: true,
            follow_up: true,
            health_tips: true,
            loyalty: true,
        }
    }
}

/// Which preference flag to flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPref {
    Medication,
    FollowUp,
    HealthTips,
    Loyalty,
}

impl NotificationPrefs {
    pub fn toggle(&mut self, pref: NotificationPref) {
        match pref {
            NotificationPref::Medication => self.medication = !self.medication,
            NotificationPref::FollowUp => self.follow_up = !self.follow_up,
            NotificationPref::HealthTips => self.health_tips = !self.health_tips,
            NotificationPref::Loyalty => self.loyalty = !self.loyalty,
        }
    }
}

/// Per-identity health profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthProfile {
    pub identity: String,
    pub display_name: Option<String>,
    pub visit_count: i64,
    pub last_visit: Option<DateTime<Utc>>,
    /// Inferred conditions, deduplicated, insertion-ordered.
    pub conditions: Vec<String>,
    /// Service categories the user has booked.
    pub preferred_categories: Vec<String>,
    /// Payment methods the user has used.
    pub payment_methods: Vec<String>,
    pub prefs: NotificationPrefs,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HealthProfile {
    pub fn new(identity: &str) -> Self {
        let now = Utc::now();
        Self {
            identity: identity.to_string(),
            display_name: None,
            visit_count: 0,
            last_visit: None,
            conditions: Vec::new(),
            preferred_categories: Vec::new(),
            payment_methods: Vec::new(),
            prefs: NotificationPrefs::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a condition if not already present.
    pub fn add_condition(&mut self, condition: &str) {
        if !self.conditions.iter().any(|c| c == condition) {
            self.conditions.push(condition.to_string());
        }
    }

    pub fn add_preferred_category(&mut self, category: &str) {
        if !self.preferred_categories.iter().any(|c| c == category) {
            self.preferred_categories.push(category.to_string());
        }
    }

    pub fn add_payment_method(&mut self, method: &str) {
        if !self.payment_methods.iter().any(|m| m == method) {
            self.payment_methods.push(method.to_string());
        }
    }

    /// Apply everything extractable from prediagnosis free text.
    pub fn apply_intake(&mut self, text: &str) {
        for condition in extract_conditions(text) {
            self.add_condition(&condition);
        }
        if let Some(name) = extract_name(text) {
            self.display_name = Some(name);
        }
    }

    /// One-line summary handed to the advisory gateway as context.
    pub fn summary(&self) -> String {
        format!(
            "name: {}; visits: {}; conditions: {}; preferred services: {}",
            self.display_name.as_deref().unwrap_or("unknown"),
            self.visit_count,
            join_or_none(&self.conditions),
            join_or_none(&self.preferred_categories),
        )
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Keyword → canonical condition. Matched case-insensitively as substrings.
static CONDITION_KEYWORDS: &[(&str, &str)] = &[
    ("uti", "UTI"),
    ("urinary", "UTI"),
    ("diabetes", "diabetes"),
    ("blood sugar", "diabetes"),
    ("ulcer", "ulcer"),
    ("stomach", "ulcer"),
    ("h pylori", "H. Pylori"),
    ("blood pressure", "hypertension"),
    ("hypertension", "hypertension"),
    ("anxiety", "mental_health"),
    ("depression", "mental_health"),
];

/// Scan free text for condition keywords.
pub fn extract_conditions(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut found = Vec::new();
    for (keyword, condition) in CONDITION_KEYWORDS {
        if lower.contains(keyword) && !found.iter().any(|c: &String| c == condition) {
            found.push((*condition).to_string());
        }
    }
    found
}

/// Loose "my name is X" / "I'm X" extraction.
pub fn extract_name(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)(?:name|i'm|i am|call me)\s+(?:is\s+)?([A-Za-z]+)").ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Bundles worth suggesting for this profile, mirroring the booking
/// history heuristics. Falls back to a default pair when nothing matches.
pub fn recommended_bundles(profile: &HealthProfile) -> Vec<&'static BundleDef> {
    let mut out: Vec<&'static BundleDef> = Vec::new();

    if profile.conditions.iter().any(|c| c == "diabetes")
        || profile.preferred_categories.iter().any(|c| c == "monitoring")
    {
        out.push(&BUNDLES[0]);
    }
    if profile.preferred_categories.iter().any(|c| c == "specialized") {
        out.push(&BUNDLES[1]);
    }
    if profile.visit_count >= 2 {
        out.push(&BUNDLES[2]);
    }
    if out.is_empty() {
        out.push(&BUNDLES[0]);
        out.push(&BUNDLES[2]);
    }
    out
}

/// Greeting recommendations from conditions, visit count, and balance.
pub fn recommendations(profile: &HealthProfile, loyalty_balance: i64) -> Vec<String> {
    let mut out = Vec::new();
    let name = profile.display_name.as_deref().unwrap_or("there");

    for condition in &profile.conditions {
        if let Some(tips) = tips_for(condition) {
            // Deterministic rotation through the tip list.
            let tip = tips[(profile.visit_count as usize) % tips.len()];
            out.push(format!("Hi {name}, {condition} tip: {tip}"));
        }
    }

    if profile.visit_count >= 3 {
        if loyalty_balance >= 100 {
            out.push(format!(
                "You have {loyalty_balance} loyalty points. Redeem for free logistics or service discounts."
            ));
        } else {
            out.push(format!(
                "Because you've visited {} times, your next logistics fee is free!",
                profile.visit_count
            ));
        }
    }

    out
}
