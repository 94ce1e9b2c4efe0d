//! The reassignment orchestrator.

use handover_core::{
  Error, Result,
  collab::{Action, Lookup},
  config::WorkflowConfig,
  model::{
    BuildingPolicy, Device, DirectoryIdentity, Line, PhoneTemplate, VoicemailAccount,
  },
  query::{
    BuildingById, CallManagerUserById, DevicesByOwner, DirectoryUserByAccount, LineById,
    ParkedMailboxes, PhoneById, PhoneTemplatesByBuilding, VoicemailByAlias,
  },
  request::{
    AssignPhoneOwner, CreateEndUser, CreateExternalServiceAccount, CreateSmtpProxyAddress,
    CreateVoicemailUser, DeleteDeviceUserMap, DeletePhone, ReplaceDeviceUserMap,
    SetPhoneOwnerName, UpdateCallHandlerSchedule, UpdateDirectoryPhone, UpdateLine,
    UpdatePhoneLine, UpdateTransferOption, UpdateVoicemailExtension,
  },
};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::{
  dispatch::{Dispatcher, PENDING},
  extension::{ExtensionGenerator, ParkedPool},
  fetch::{all, at_least_one, at_most_one, exactly_one},
  outcome::{AccountStep, Outcome, VoicemailStep},
  resolver::{ConflictResolver, Resolution},
};

/// Input of one reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentRequest {
  /// Device-line association being handed over.
  pub line_id:       String,
  pub device_id:     String,
  pub building_id:   i64,
  pub external_mask: String,
  /// Account name of the outgoing owner, if the line had one.
  #[serde(default)]
  pub current_owner: Option<String>,
  pub new_owner:     String,
  pub label:         String,
  pub display_name:  String,
}

impl ReassignmentRequest {
  /// The outgoing owner, treating an empty id as none.
  pub fn current_owner(&self) -> Option<&str> {
    self
      .current_owner
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
  }
}

/// Runs reassignments against one pair of collaborators.
///
/// Holds no per-run state, so a single instance can serve concurrent
/// requests.
pub struct Reassigner<L, A> {
  lookup: L,
  action: A,
  config: WorkflowConfig,
  seed:   Option<u64>,
}

impl<L: Lookup, A: Action> Reassigner<L, A> {
  pub fn new(lookup: L, action: A, config: WorkflowConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { lookup, action, config, seed: None })
  }

  /// Draw parked extensions from a fixed seed instead of OS entropy.
  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  pub fn config(&self) -> &WorkflowConfig { &self.config }

  pub fn lookup(&self) -> &L { &self.lookup }

  pub fn action(&self) -> &A { &self.action }

  /// Reassign `request.line_id` to `request.new_owner`.
  ///
  /// Phases run strictly in order and a failure stops the run where it is;
  /// mutations already made are not rolled back.
  pub async fn run(&self, request: &ReassignmentRequest) -> Result<Outcome> {
    if request.new_owner.trim().is_empty() {
      return Err(Error::Config("new owner id is required".to_owned()));
    }

    let run_id = Uuid::new_v4();
    let span = info_span!(
      "reassignment",
      %run_id,
      line = %request.line_id,
      new_owner = %request.new_owner,
    );

    async move {
      let range = self.config.parked_extensions;
      let generator = match self.seed {
        Some(seed) => ExtensionGenerator::seeded(range, seed),
        None => ExtensionGenerator::from_entropy(range),
      };

      let run = Run {
        lookup: &self.lookup,
        config: &self.config,
        dispatcher: Dispatcher::new(&self.action, &self.config),
        request,
        generator,
        pool: ParkedPool::default(),
        outcome: Outcome::new(run_id, self.config.read_only),
      };

      let result = run.execute().await;
      match &result {
        Ok(outcome) => info!(
          issued = outcome.actions_issued,
          suppressed = outcome.actions_suppressed,
          warnings = outcome.warnings.len(),
          "reassignment completed"
        ),
        Err(e) => error!(kind = e.kind().as_str(), error = %e, "reassignment aborted"),
      }
      result
    }
    .instrument(span)
    .await
  }
}

// ─── Run ─────────────────────────────────────────────────────────────────────

/// Records read once during validation and threaded through the run.
struct Snapshot {
  current_owner: Option<DirectoryIdentity>,
  new_owner:     DirectoryIdentity,
  line:          Line,
  phone:         Device,
  building:      Option<BuildingPolicy>,
}

struct Run<'a, L, A> {
  lookup:     &'a L,
  config:     &'a WorkflowConfig,
  dispatcher: Dispatcher<'a, A>,
  request:    &'a ReassignmentRequest,
  generator:  ExtensionGenerator,
  pool:       ParkedPool,
  outcome:    Outcome,
}

impl<L: Lookup, A: Action> Run<'_, L, A> {
  async fn execute(mut self) -> Result<Outcome> {
    let request = self.request;
    let snapshot = self.validate().await?;
    self.outcome.line_pattern = snapshot.line.pattern.clone();

    if let Some(owner) = request.current_owner() {
      info!(owner, "checking previous owner for associated devices");
      self.evict_devices(owner, &snapshot).await?;
    }

    let user_pkid = self.ensure_call_manager_user(&snapshot).await?;
    self.repoint_line_and_device(&snapshot).await?;

    let new_owner = request.new_owner.trim();
    info!(owner = new_owner, "checking new owner for associated devices");
    self.evict_devices(new_owner, &snapshot).await?;

    self.bind_identity(&snapshot, &user_pkid).await?;
    self.propagate_pattern(&snapshot).await?;

    let resolution = self.resolve_conflicts(&snapshot).await?;
    let account = self.provision_voicemail(&snapshot, resolution.as_ref()).await?;
    self.outcome.resolution = resolution;

    self.sync_call_schedule(&snapshot, account.as_ref()).await?;
    self.sync_transfer_rules(&snapshot, account.as_ref()).await?;

    self.outcome.actions_issued = self.dispatcher.issued();
    self.outcome.actions_suppressed = self.dispatcher.suppressed();
    Ok(self.outcome)
  }

  // ─── 1. Validation ───────────────────────────────────────────────────────

  async fn validate(&mut self) -> Result<Snapshot> {
    info!("validating resources prior to executing changes");
    let request = self.request;

    let current_owner = match request.current_owner() {
      Some(owner) => {
        info!(owner, "retrieving current owner directory account");
        let found = at_most_one(self.lookup, &DirectoryUserByAccount::new(owner)).await?;
        if found.is_none() {
          warn!(owner, "current owner has no directory account");
        }
        found
      }
      None => None,
    };

    info!("retrieving new owner directory account");
    let new_owner =
      exactly_one(self.lookup, &DirectoryUserByAccount::new(request.new_owner.trim())).await?;

    info!("retrieving call-manager line");
    let line = exactly_one(self.lookup, &LineById::new(request.line_id.as_str())).await?;

    info!("retrieving call-manager phone");
    let phone = exactly_one(self.lookup, &PhoneById::new(request.device_id.as_str())).await?;

    info!("retrieving building");
    let building = at_most_one(self.lookup, &BuildingById::new(request.building_id)).await?;
    if building.is_none() {
      warn!(building_id = request.building_id, "building not found, site policy will not be applied");
    }

    info!("retrieving phone templates");
    let templates: Vec<PhoneTemplate> =
      at_least_one(self.lookup, &PhoneTemplatesByBuilding::new(request.building_id)).await?;

    let parked = all(self.lookup, &ParkedMailboxes).await?;
    self.pool = ParkedPool::new(
      parked
        .into_iter()
        .filter(|record| !record.deleted)
        .map(|record| record.extension),
    );

    info!(
      templates = templates.len(),
      parked = self.pool.len(),
      pattern = %line.pattern,
      "validation completed"
    );

    Ok(Snapshot { current_owner, new_owner, line, phone, building })
  }

  // ─── 2 / 5. Device eviction ──────────────────────────────────────────────

  /// Unmap and delete every non-hardphone device of `owner`, except the one
  /// being handed over.
  async fn evict_devices(&mut self, owner: &str, snapshot: &Snapshot) -> Result<()> {
    let devices = all(self.lookup, &DevicesByOwner::new(owner)).await?;
    if devices.is_empty() {
      info!(owner, "no devices found for owner");
      return Ok(());
    }
    info!(owner, count = devices.len(), "owner has associated devices");

    for device in devices {
      if device.is_hardphone(&self.config.hardphone_prefix) {
        warn!(device = %device.name, pkid = %device.pkid, "hardphone, skipping device removal");
        if !self.outcome.skipped_hardphones.contains(&device.name) {
          self.outcome.skipped_hardphones.push(device.name);
        }
        continue;
      }

      if device.has_id(&snapshot.phone.pkid) || device.has_id(&snapshot.line.device_pkid) {
        info!(device = %device.name, "device is being handed over, keeping it");
        continue;
      }

      info!(device = %device.name, pkid = %device.pkid, "removing device");
      self
        .dispatcher
        .submit(&DeleteDeviceUserMap {
          fkdevice: device.pkid.clone(),
          userid:   owner.to_owned(),
        })
        .await?;
      self
        .dispatcher
        .submit(&DeletePhone { uuid: device.pkid.clone(), name: device.name.clone() })
        .await?;
      self.outcome.deleted_devices.push(device.name);
    }

    Ok(())
  }

  // ─── 3. Call-manager account ─────────────────────────────────────────────

  async fn ensure_call_manager_user(&mut self, snapshot: &Snapshot) -> Result<String> {
    info!("checking new owner for a call-manager account");
    let owner = self.request.new_owner.trim();

    let step = match at_most_one(self.lookup, &CallManagerUserById::new(owner)).await? {
      Some(user) => {
        info!(pkid = %user.pkid, "new owner exists in the call manager, reusing account");
        AccountStep::Reused { pkid: user.pkid }
      }
      None => {
        info!("new owner missing from the call manager, creating account");
        let created = self
          .dispatcher
          .submit(&CreateEndUser::from_identity(&snapshot.new_owner))
          .await?;
        let pkid = created.map_or_else(|| PENDING.to_owned(), |user| user.pkid);
        AccountStep::Created { pkid }
      }
    };

    let pkid = step.pkid().to_owned();
    self.outcome.call_manager_user = Some(step);
    Ok(pkid)
  }

  // ─── 4. Line and device ──────────────────────────────────────────────────

  async fn repoint_line_and_device(&mut self, snapshot: &Snapshot) -> Result<()> {
    let request = self.request;
    let line = &snapshot.line;

    info!(
      dirn = %line.dirn_uuid,
      description = %request.label,
      alerting_name = %request.display_name,
      "updating directory number description"
    );
    self
      .dispatcher
      .submit(&UpdateLine {
        uuid:                line.dirn_uuid.clone(),
        description:         request.label.clone(),
        alerting_name:       request.display_name.clone(),
        ascii_alerting_name: request.display_name.clone(),
      })
      .await?;

    info!(
      line = %line.uuid,
      phone = %snapshot.phone.pkid,
      index = %line.index,
      mask = %request.external_mask,
      "updating device-to-line labels"
    );
    self
      .dispatcher
      .submit(&UpdatePhoneLine {
        uuid:           line.uuid.clone(),
        phone_uuid:     snapshot.phone.pkid.clone(),
        index:          line.index.clone(),
        dirn_pattern:   line.pattern.clone(),
        partition_text: line.partition_text.clone().unwrap_or_default(),
        label:          request.label.clone(),
        display:        request.display_name.clone(),
        e164_mask:      request.external_mask.clone(),
      })
      .await?;

    info!(phone = %snapshot.phone.pkid, owner = %request.new_owner, "updating phone owner");
    self
      .dispatcher
      .submit(&AssignPhoneOwner {
        uuid:             snapshot.phone.pkid.clone(),
        owner:            request.new_owner.trim().to_owned(),
        remove_all_users: true,
      })
      .await?;

    Ok(())
  }

  // ─── 6 / 7. Identity binding ─────────────────────────────────────────────

  async fn bind_identity(&mut self, snapshot: &Snapshot, user_pkid: &str) -> Result<()> {
    info!(
      fkdevice = %snapshot.line.device_pkid,
      fkenduser = user_pkid,
      "replacing device user mapping with the new owner"
    );
    self
      .dispatcher
      .submit(&ReplaceDeviceUserMap::new(&snapshot.line.device_pkid, user_pkid))
      .await?;

    info!(phone = %snapshot.phone.pkid, "updating new owner primary extension");
    self
      .dispatcher
      .submit(&SetPhoneOwnerName {
        uuid:  snapshot.phone.pkid.clone(),
        owner: self.request.new_owner.trim().to_owned(),
      })
      .await?;

    Ok(())
  }

  async fn propagate_pattern(&mut self, snapshot: &Snapshot) -> Result<()> {
    info!(
      object_guid = %snapshot.new_owner.object_guid,
      pattern = %snapshot.line.pattern,
      "updating new owner ipPhone and telephoneNumber"
    );
    self
      .dispatcher
      .submit(&UpdateDirectoryPhone::new(&snapshot.new_owner, &snapshot.line.pattern))
      .await?;
    Ok(())
  }

  // ─── 8. Conflicts ────────────────────────────────────────────────────────

  async fn resolve_conflicts(&mut self, snapshot: &Snapshot) -> Result<Option<Resolution>> {
    if self.request.current_owner().is_none() {
      info!("no previous owner, skipping extension conflict check");
      return Ok(None);
    }

    let resolver = ConflictResolver::new(self.lookup, &self.dispatcher, self.config);
    let resolution = resolver
      .resolve(
        &snapshot.line.pattern,
        &snapshot.new_owner.account_name,
        snapshot.current_owner.as_ref(),
        &mut self.generator,
        &mut self.pool,
      )
      .await?;

    Ok(Some(resolution))
  }

  // ─── 9. Voicemail ────────────────────────────────────────────────────────

  /// Returns the account the later phases act on; `None` only after a
  /// suppressed creation.
  async fn provision_voicemail(
    &mut self,
    snapshot: &Snapshot,
    resolution: Option<&Resolution>,
  ) -> Result<Option<VoicemailAccount>> {
    info!("checking new owner for a voicemail account");
    let alias = self.request.new_owner.trim();
    let pattern = snapshot.line.pattern.as_str();

    match at_most_one(self.lookup, &VoicemailByAlias::new(alias)).await? {
      None => {
        info!(extension = pattern, "creating voicemail account for new owner");
        let template = snapshot.building.as_ref().and_then(BuildingPolicy::voicemail_template);
        let created = self
          .dispatcher
          .submit(&CreateVoicemailUser::new(
            alias,
            &snapshot.new_owner,
            pattern,
            template,
            self.config.ldap_linked,
          ))
          .await?;

        let object_id = created.map_or_else(|| PENDING.to_owned(), |user| user.object_id);
        self.attach_best_effort(&snapshot.new_owner, &object_id).await;
        self.outcome.voicemail = Some(VoicemailStep::Created { object_id });

        if self.dispatcher.read_only() {
          return Ok(None);
        }
        exactly_one(self.lookup, &VoicemailByAlias::new(alias)).await.map(Some)
      }
      Some(account) => {
        let object_id = account.object_id.clone();
        let step = if resolution.is_some_and(Resolution::skips_reassignment) {
          info!(object_id = %object_id, "owner already assigned to the extension, skipping assignment");
          VoicemailStep::AlreadyAssigned { object_id: object_id.clone() }
        } else {
          info!(object_id = %object_id, extension = pattern, "moving new owner voicemail account to the line extension");
          self
            .dispatcher
            .submit(&UpdateVoicemailExtension {
              object_id: object_id.clone(),
              extension: pattern.to_owned(),
            })
            .await?;
          VoicemailStep::ExtensionUpdated { object_id: object_id.clone() }
        };

        self.attach_best_effort(&snapshot.new_owner, &object_id).await;
        self.outcome.voicemail = Some(step);
        Ok(Some(account))
      }
    }
  }

  /// SMTP proxy address and unified-messaging binding. Failures are logged
  /// and recorded, never propagated.
  async fn attach_best_effort(&mut self, identity: &DirectoryIdentity, object_id: &str) {
    let Some(mail) = identity.mail() else {
      info!("new owner has no mail address, skipping smtp proxy and unified messaging");
      return;
    };

    if self.config.add_smtp_proxy {
      info!(mail, object_id, "adding smtp proxy address");
      let request = CreateSmtpProxyAddress {
        smtp_address: mail.to_owned(),
        object_id:    object_id.to_owned(),
      };
      if let Err(e) = self.dispatcher.submit(&request).await {
        warn!(error = %e, "adding smtp proxy address failed");
        self.outcome.warnings.push(format!("smtp proxy address: {e}"));
      }
    }

    if self.config.attach_unified_messaging {
      info!(object_id, "binding unified messaging external service account");
      let request =
        CreateExternalServiceAccount::new(&self.config.unified_messaging_service_id, object_id);
      if let Err(e) = self.dispatcher.submit(&request).await {
        warn!(error = %e, "binding unified messaging account failed");
        self.outcome.warnings.push(format!("unified messaging: {e}"));
      }
    }
  }

  // ─── 10 / 11. Call handler ───────────────────────────────────────────────

  /// The call handler of `account`; `None` when creation was suppressed.
  fn call_handler<'v>(&self, account: Option<&'v VoicemailAccount>) -> Result<Option<&'v str>> {
    match account {
      None => Ok(None),
      Some(account) => account.call_handler().map(Some).ok_or_else(|| Error::NotFound {
        entity: "voicemail call handler",
        key:    account.object_id.clone(),
      }),
    }
  }

  async fn sync_call_schedule(
    &mut self,
    snapshot: &Snapshot,
    account: Option<&VoicemailAccount>,
  ) -> Result<()> {
    info!("updating voicemail call schedule for new owner");
    let Some(building) = &snapshot.building else {
      info!("no building policy, skipping call schedule");
      return Ok(());
    };
    let Some(schedule) = building.call_schedule() else {
      info!(building_id = building.building_id, "building has no call schedule, skipping");
      return Ok(());
    };
    let Some(handler) = self.call_handler(account)? else {
      info!("call handler unknown until the account exists, skipping call schedule");
      return Ok(());
    };

    info!(call_handler = handler, schedule, "pointing call handler at building schedule");
    self
      .dispatcher
      .submit(&UpdateCallHandlerSchedule {
        call_handler: handler.to_owned(),
        schedule_set: schedule.to_owned(),
      })
      .await?;
    self.outcome.call_schedule_synced = true;
    Ok(())
  }

  async fn sync_transfer_rules(
    &mut self,
    snapshot: &Snapshot,
    account: Option<&VoicemailAccount>,
  ) -> Result<()> {
    info!("checking whether transfer rules are enabled for the building");
    let Some(building) = snapshot.building.as_ref().filter(|b| b.transfer_rules_enabled) else {
      info!("transfer rules not enabled, skipping");
      return Ok(());
    };
    let Some(handler) = self.call_handler(account)? else {
      info!("call handler unknown until the account exists, skipping transfer rules");
      return Ok(());
    };

    for (option, rule) in building.transfer_rules() {
      info!(
        call_handler = handler,
        option = option.as_str(),
        action = rule.action,
        enabled = rule.enabled,
        "updating transfer rule"
      );
      self
        .dispatcher
        .submit(&UpdateTransferOption {
          option,
          action: rule.action,
          enabled: rule.enabled,
          call_handler: handler.to_owned(),
        })
        .await?;
    }

    self.outcome.transfer_rules_synced = true;
    Ok(())
  }
}
