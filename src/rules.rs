//! Stored pricing rules.
//!
//! A [`PricingRule`] is a named, reusable strategy configuration.  The
//! store keeps rules in process memory; every configuration is checked
//! by the engine before it is accepted, so a stored rule never holds a
//! configuration its strategy would reject.

use crate::context::Fields;
use crate::engine::PricingEngine;
use crate::error::{ApiError, PricingError};
use crate::models::StrategyKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// A named strategy configuration that calculations can reference by
/// `rule_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRule {
    /// Assigned by the store on creation.
    pub id: Uuid,
    /// Human-readable label.  Never empty.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// The strategy `config` was validated against.
    pub strategy_type: StrategyKind,
    /// Strategy-specific parameters, e.g. `regional_multipliers` for a
    /// geographic rule or `rules` for a rule-based one.
    pub config: Fields,
    /// Inactive rules stay listed but cannot be used for calculation.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Bumped on every update and on deletion.
    pub updated_at: DateTime<Utc>,
    /// Set by a soft delete.  Deleted rules are invisible to every
    /// store operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Body of a rule creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Strategy name as sent by the caller; parsed on creation so an
    /// unknown name reports `InvalidStrategy`.
    pub strategy_type: String,
    pub config: Fields,
    /// Defaults to `true`.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub strategy_type: Option<String>,
    pub config: Option<Fields>,
    pub is_active: Option<bool>,
}

/// Criteria for [`RuleStore::list`].  Unset fields match every rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleFilter {
    /// Only rules using this strategy.
    pub strategy_type: Option<StrategyKind>,
    /// Only active (`true`) or only inactive (`false`) rules.
    pub is_active: Option<bool>,
}

/// In-memory rule repository.  Configurations are checked with the
/// shared engine before they are stored.
pub struct RuleStore {
    engine: Arc<PricingEngine>,
    rules: RwLock<HashMap<Uuid, PricingRule>>,
}

impl RuleStore {
    pub fn new(engine: Arc<PricingEngine>) -> Self {
        Self {
            engine,
            rules: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, new: NewRule) -> Result<PricingRule, ApiError> {
        if new.name.trim().is_empty() {
            return Err(PricingError::MissingRequiredField("name is required".into()).into());
        }
        let kind: StrategyKind = new.strategy_type.parse()?;
        self.engine.validate_config(kind.as_str(), &new.config)?;

        let now = Utc::now();
        let rule = PricingRule {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            strategy_type: kind,
            config: new.config,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.rules.write().await.insert(rule.id, rule.clone());
        info!(rule_id = %rule.id, strategy = %kind, "pricing rule created");
        Ok(rule)
    }

    /// Returns a rule unless it does not exist or has been deleted.
    pub async fn get(&self, id: Uuid) -> Result<PricingRule, ApiError> {
        self.rules
            .read()
            .await
            .get(&id)
            .filter(|r| r.deleted_at.is_none())
            .cloned()
            .ok_or(ApiError::RuleNotFound(id))
    }

    /// Live rules matching `filter`, oldest first.
    pub async fn list(&self, filter: &RuleFilter) -> Vec<PricingRule> {
        let rules = self.rules.read().await;
        let mut out: Vec<PricingRule> = rules
            .values()
            .filter(|r| r.deleted_at.is_none())
            .filter(|r| filter.strategy_type.map_or(true, |k| r.strategy_type == k))
            .filter(|r| filter.is_active.map_or(true, |a| r.is_active == a))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.created_at);
        out
    }

    /// Applies a partial update.  When either the strategy or the config
    /// changes, the resulting pair is validated as a whole.
    pub async fn update(&self, id: Uuid, update: RuleUpdate) -> Result<PricingRule, ApiError> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .get_mut(&id)
            .filter(|r| r.deleted_at.is_none())
            .ok_or(ApiError::RuleNotFound(id))?;

        let kind = match &update.strategy_type {
            Some(name) => name.parse()?,
            None => rule.strategy_type,
        };
        let config = update.config.as_ref().unwrap_or(&rule.config);
        if update.strategy_type.is_some() || update.config.is_some() {
            self.engine.validate_config(kind.as_str(), config)?;
        }

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(PricingError::InvalidFieldValue("name cannot be empty".into()).into());
            }
            rule.name = name;
        }
        if let Some(description) = update.description {
            rule.description = description;
        }
        if let Some(config) = update.config {
            rule.config = config;
        }
        if let Some(active) = update.is_active {
            rule.is_active = active;
        }
        rule.strategy_type = kind;
        rule.updated_at = Utc::now();
        info!(rule_id = %id, "pricing rule updated");
        Ok(rule.clone())
    }

    /// Soft delete: the rule stays in memory but is no longer visible.
    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .get_mut(&id)
            .filter(|r| r.deleted_at.is_none())
            .ok_or(ApiError::RuleNotFound(id))?;
        let now = Utc::now();
        rule.deleted_at = Some(now);
        rule.updated_at = now;
        info!(rule_id = %id, "pricing rule deleted");
        Ok(())
    }
}
