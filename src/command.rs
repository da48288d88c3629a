//! Two-phase creation of autoscale VM groups
//!
//! `create` allocates a dormant group owned by the load balancer rule's
//! account; `execute` activates it. If activation fails in any way the group
//! allocated by `create` is deleted before the error reaches the caller, so a
//! half-configured group is never observable.

use std::sync::Arc;

use uuid::Uuid;

use crate::models::*;
use crate::{Error, Result};

/// API response name of the creation command
pub const COMMAND_NAME: &str = "autoscalevmgroupresponse";
/// Object name the response is wrapped in
pub const RESULT_OBJECT_NAME: &str = "autoscalevmgroup";
pub const EVENT_AUTOSCALEVMGROUP_CREATE: &str = "AUTOSCALEVMGROUP.CREATE";
/// Async job instance type tracked for this command
pub const INSTANCE_TYPE: &str = "AutoScaleVmGroup";

#[cfg_attr(test, mockall::automock)]
pub trait LoadBalancerLookup: Send + Sync {
    fn find_load_balancer(&self, id: u64) -> Result<Option<LoadBalancerRule>>;
}

/// Domain service owning autoscale group persistence
#[cfg_attr(test, mockall::automock)]
pub trait AutoScaleService: Send + Sync {
    /// Persist a group in the `Allocated` state
    fn create_group(
        &self,
        owner: AccountId,
        request: &AutoScaleGroupRequest,
    ) -> Result<Option<AutoScaleGroupEntity>>;
    /// Activate a previously allocated group
    fn configure_group(&self, group_id: u64) -> Result<bool>;
    fn delete_group(&self, group_id: u64) -> Result<bool>;
    fn find_group(&self, group_id: u64) -> Result<Option<AutoScaleGroupEntity>>;
}

/// Identity recorded by the creation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRef {
    pub id: u64,
    pub external_id: Uuid,
}

/// Command context carried from `create` to `execute`
#[derive(Debug, Clone)]
pub struct CreateAutoScaleGroupCmd {
    request: AutoScaleGroupRequest,
    owner: Option<AccountId>,
    entity: Option<EntityRef>,
}

impl CreateAutoScaleGroupCmd {
    pub fn new(request: AutoScaleGroupRequest) -> Self {
        Self {
            request,
            owner: None,
            entity: None,
        }
    }

    pub fn request(&self) -> &AutoScaleGroupRequest {
        &self.request
    }

    pub fn owner(&self) -> Option<AccountId> {
        self.owner
    }

    /// Set once `create` succeeds, never before
    pub fn entity(&self) -> Option<EntityRef> {
        self.entity
    }

    pub fn command_name(&self) -> &'static str {
        COMMAND_NAME
    }

    pub fn event_type(&self) -> &'static str {
        EVENT_AUTOSCALEVMGROUP_CREATE
    }

    pub fn create_event_description(&self) -> String {
        "creating AutoScale Vm Group".to_string()
    }

    pub fn event_description(&self) -> String {
        match self.entity {
            Some(e) => format!("configuring AutoScale Vm Group. Vm Group Id: {}", e.id),
            None => "configuring AutoScale Vm Group".to_string(),
        }
    }
}

pub struct CommandLifecycleController {
    service: Arc<dyn AutoScaleService>,
    load_balancers: Arc<dyn LoadBalancerLookup>,
}

impl CommandLifecycleController {
    pub fn new(service: Arc<dyn AutoScaleService>, load_balancers: Arc<dyn LoadBalancerLookup>) -> Self {
        Self {
            service,
            load_balancers,
        }
    }

    /// Owner of the group is the owner of the load balancer rule it fronts
    pub fn resolve_owner(&self, request: &AutoScaleGroupRequest) -> Result<AccountId> {
        self.load_balancers
            .find_load_balancer(request.load_balancer_rule_id)?
            .map(|rule| rule.account_id)
            .ok_or(Error::OwnerResolution(request.load_balancer_rule_id))
    }

    /// Allocation step
    pub fn create(&self, cmd: &mut CreateAutoScaleGroupCmd) -> Result<EntityRef> {
        cmd.request.validate()?;
        let owner = self.resolve_owner(&cmd.request)?;
        cmd.owner = Some(owner);

        tracing::info!(
            event = cmd.event_type(),
            lb_rule = cmd.request.load_balancer_rule_id,
            owner,
            "{}",
            cmd.create_event_description()
        );

        let group = match self.service.create_group(owner, &cmd.request) {
            Ok(Some(group)) => group,
            Ok(None) => {
                return Err(Error::creation("service returned no group", None));
            }
            Err(e) => {
                tracing::warn!(lb_rule = cmd.request.load_balancer_rule_id, error = %e, "Failed to create autoscale vm group");
                return Err(Error::creation("service error", Some(e)));
            }
        };

        let entity = EntityRef {
            id: group.id,
            external_id: group.external_id,
        };
        cmd.entity = Some(entity);
        Ok(entity)
    }

    /// Activation step; compensates on any failure
    pub fn execute(&self, cmd: &CreateAutoScaleGroupCmd) -> Result<AutoScaleGroupResponse> {
        let entity = cmd
            .entity
            .ok_or_else(|| Error::Validation("execute called before a successful create".into()))?;

        tracing::info!(event = cmd.event_type(), group = entity.id, "{}", cmd.event_description());

        match self.activate(entity.id) {
            Ok(group) => Ok(AutoScaleGroupResponse::from_entity(&group, cmd.command_name())),
            Err(cause) => {
                if let Some(e) = &cause {
                    tracing::warn!(group = entity.id, error = %e, "Failed to create autoscale vm group");
                }
                self.compensate(entity);
                Err(Error::activation(entity.id, cause))
            }
        }
    }

    /// `create` then `execute`
    pub fn submit(&self, request: AutoScaleGroupRequest) -> Result<AutoScaleGroupResponse> {
        let mut cmd = CreateAutoScaleGroupCmd::new(request);
        self.create(&mut cmd)?;
        self.execute(&cmd)
    }

    /// `Err(None)` is a failure without an underlying error: the service said
    /// no, or reported success for a group it cannot return.
    fn activate(&self, group_id: u64) -> std::result::Result<AutoScaleGroupEntity, Option<Error>> {
        if !self.service.configure_group(group_id).map_err(Some)? {
            return Err(None);
        }
        match self.service.find_group(group_id) {
            Ok(Some(group)) => Ok(group),
            Ok(None) => {
                tracing::warn!(group = group_id, "Group reported configured but cannot be found");
                Err(None)
            }
            Err(e) => Err(Some(e)),
        }
    }

    fn compensate(&self, entity: EntityRef) {
        match self.service.delete_group(entity.id) {
            Ok(true) => {
                tracing::warn!(group = entity.id, uuid = %entity.external_id, "Rolled back autoscale vm group");
            }
            Ok(false) => {
                tracing::warn!(group = entity.id, "Rollback found no autoscale vm group to delete");
            }
            Err(e) => {
                tracing::error!(group = entity.id, error = %e, "Failed to roll back autoscale vm group");
            }
        }
    }
}
