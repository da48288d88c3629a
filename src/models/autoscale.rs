//! Autoscale VM group model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AccountId = u64;

/// Load balancer rule an autoscale group is attached to.
/// The group's owner is always the rule's owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerRule {
    pub id: u64,
    pub account_id: AccountId,
    pub name: String,
}

/// Parameters of a `createAutoScaleVmGroup` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScaleGroupRequest {
    pub load_balancer_rule_id: u64,
    pub min_members: u32,
    pub max_members: u32,
    /// How often scale conditions are evaluated, in seconds
    pub interval: Option<u32>,
    pub scale_up_policy_ids: Vec<u64>,
    pub scale_down_policy_ids: Vec<u64>,
    pub vm_profile_id: u64,
}

impl AutoScaleGroupRequest {
    pub fn builder(load_balancer_rule_id: u64, vm_profile_id: u64) -> AutoScaleGroupRequestBuilder {
        AutoScaleGroupRequestBuilder {
            request: AutoScaleGroupRequest {
                load_balancer_rule_id,
                min_members: 0,
                max_members: 0,
                interval: None,
                scale_up_policy_ids: Vec::new(),
                scale_down_policy_ids: Vec::new(),
                vm_profile_id,
            },
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_members < self.min_members {
            return Err(crate::Error::Validation(format!(
                "maxMembers ({}) must be greater than or equal to minMembers ({})",
                self.max_members, self.min_members
            )));
        }
        if self.scale_up_policy_ids.is_empty() {
            return Err(crate::Error::Validation("scaleUpPolicyIds cannot be empty".into()));
        }
        if self.scale_down_policy_ids.is_empty() {
            return Err(crate::Error::Validation("scaleDownPolicyIds cannot be empty".into()));
        }
        Ok(())
    }
}

pub struct AutoScaleGroupRequestBuilder {
    request: AutoScaleGroupRequest,
}

impl AutoScaleGroupRequestBuilder {
    pub fn members(mut self, min: u32, max: u32) -> Self {
        self.request.min_members = min;
        self.request.max_members = max;
        self
    }

    pub fn interval(mut self, seconds: u32) -> Self {
        self.request.interval = Some(seconds);
        self
    }

    pub fn scale_up(mut self, policy_id: u64) -> Self {
        self.request.scale_up_policy_ids.push(policy_id);
        self
    }

    pub fn scale_down(mut self, policy_id: u64) -> Self {
        self.request.scale_down_policy_ids.push(policy_id);
        self
    }

    pub fn build(self) -> AutoScaleGroupRequest {
        self.request
    }
}

/// Lifecycle state of an autoscale group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupState {
    /// Persisted by the creation step, not yet configured
    Allocated,
    /// Configured and evaluating policies
    Active,
    Failed,
}

impl std::fmt::Display for GroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupState::Allocated => write!(f, "Allocated"),
            GroupState::Active => write!(f, "Active"),
            GroupState::Failed => write!(f, "Failed"),
        }
    }
}

/// A persisted autoscale group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScaleGroupEntity {
    pub id: u64,
    /// Public identifier handed out to API callers
    pub external_id: Uuid,
    pub owner_account_id: AccountId,
    pub load_balancer_rule_id: u64,
    pub min_members: u32,
    pub max_members: u32,
    pub interval: Option<u32>,
    pub scale_up_policy_ids: Vec<u64>,
    pub scale_down_policy_ids: Vec<u64>,
    pub vm_profile_id: u64,
    pub state: GroupState,
}

impl AutoScaleGroupEntity {
    pub fn allocate(id: u64, owner_account_id: AccountId, request: &AutoScaleGroupRequest) -> Self {
        Self {
            id,
            external_id: Uuid::new_v4(),
            owner_account_id,
            load_balancer_rule_id: request.load_balancer_rule_id,
            min_members: request.min_members,
            max_members: request.max_members,
            interval: request.interval,
            scale_up_policy_ids: request.scale_up_policy_ids.clone(),
            scale_down_policy_ids: request.scale_down_policy_ids.clone(),
            vm_profile_id: request.vm_profile_id,
            state: GroupState::Allocated,
        }
    }
}

/// Response projection of an activated group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub struct AutoScaleGroupResponse {
    pub id: Uuid,
    #[serde(rename = "lbruleid")]
    pub load_balancer_rule_id: u64,
    #[serde(rename = "minmembers")]
    pub min_members: u32,
    #[serde(rename = "maxmembers")]
    pub max_members: u32,
    pub interval: Option<u32>,
    #[serde(rename = "scaleuppolicies")]
    pub scale_up_policy_ids: Vec<u64>,
    #[serde(rename = "scaledownpolicies")]
    pub scale_down_policy_ids: Vec<u64>,
    #[serde(rename = "vmprofileid")]
    pub vm_profile_id: u64,
    #[serde(rename = "accountid")]
    pub account_id: AccountId,
    pub state: GroupState,
    #[serde(skip)]
    pub response_name: String,
}

impl AutoScaleGroupResponse {
    pub fn from_entity(entity: &AutoScaleGroupEntity, response_name: &str) -> Self {
        Self {
            id: entity.external_id,
            load_balancer_rule_id: entity.load_balancer_rule_id,
            min_members: entity.min_members,
            max_members: entity.max_members,
            interval: entity.interval,
            scale_up_policy_ids: entity.scale_up_policy_ids.clone(),
            scale_down_policy_ids: entity.scale_down_policy_ids.clone(),
            vm_profile_id: entity.vm_profile_id,
            account_id: entity.owner_account_id,
            state: entity.state,
            response_name: response_name.to_string(),
        }
    }
}
