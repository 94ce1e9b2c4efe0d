//! In-memory collaborators for exercising the workflow without backends.
//!
//! [`FakeBackend`] answers every named query from plain vectors and applies
//! the effect of each action it understands to them, so a run observes its
//! own writes the way it would against the real systems. Every action call
//! is recorded, including rejected ones. Rejections are scripted with
//! [`FakeBackend::reject`].

use std::{
  collections::BTreeMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use handover_core::{
  collab::{Action, Lookup, Params, Row},
  model::{
    BuildingPolicy, CallManagerUser, Device, DirectoryIdentity, Line,
    ParkedExtensionRecord, PhoneTemplate, VoicemailAccount, same_account,
  },
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FakeError {
  #[error("{action} rejected: {reason}")]
  Rejected { action: String, reason: String },

  #[error("unknown query {0}")]
  UnknownQuery(String),

  #[error("malformed {0} payload")]
  Malformed(String),
}

/// One recorded action call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
  pub system: String,
  pub action: String,
  pub params: Params,
}

impl Call {
  /// A parameter as a string, or `""` when absent.
  pub fn param(&self, name: &str) -> &str {
    self.params.get(name).and_then(Value::as_str).unwrap_or_default()
  }
}

struct Rejection {
  action:    String,
  field:     Option<(String, String)>,
  /// `None` rejects forever.
  remaining: Option<usize>,
  reason:    String,
}

impl Rejection {
  fn applies(&self, action: &str, params: &Params) -> bool {
    if self.action != action || self.remaining == Some(0) {
      return false;
    }
    match &self.field {
      Some((name, value)) => params.get(name).and_then(Value::as_str) == Some(value.as_str()),
      None => true,
    }
  }
}

/// The fake systems' contents.
#[derive(Default)]
pub struct FakeState {
  pub directory:  Vec<DirectoryIdentity>,
  pub lines:      Vec<Line>,
  pub phones:     Vec<Device>,
  pub users:      Vec<CallManagerUser>,
  pub buildings:  Vec<BuildingPolicy>,
  pub templates:  Vec<PhoneTemplate>,
  pub voicemail:  Vec<VoicemailAccount>,
  pub parked:     Vec<ParkedExtensionRecord>,
  /// Roster rows served verbatim after `parked`, e.g. legacy rows.
  pub raw_parked: Vec<Value>,
  /// Device pkid to the user ids mapped onto it.
  pub device_map: BTreeMap<String, Vec<String>>,
  pub calls:      Vec<Call>,
  pub lookups:    Vec<String>,
  rejections:     Vec<Rejection>,
  next_id:        u32,
}

impl FakeState {
  fn next_id(&mut self, prefix: &str) -> String {
    self.next_id += 1;
    format!("{prefix}-{}", self.next_id)
  }
}

/// Shared, cloneable handle on a [`FakeState`].
#[derive(Clone, Default)]
pub struct FakeBackend {
  state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, FakeState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Mutate the state, typically to seed it.
  pub fn seed(&self, f: impl FnOnce(&mut FakeState)) -> &Self {
    f(&mut self.lock());
    self
  }

  /// Read from the state.
  pub fn inspect<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T { f(&self.lock()) }

  pub fn calls(&self) -> Vec<Call> { self.lock().calls.clone() }

  /// Recorded calls of `action`, in order.
  pub fn calls_to(&self, action: &str) -> Vec<Call> {
    self
      .lock()
      .calls
      .iter()
      .filter(|c| c.action == action)
      .cloned()
      .collect()
  }

  pub fn lookups(&self) -> Vec<String> { self.lock().lookups.clone() }

  pub fn voicemail_by_alias(&self, alias: &str) -> Option<VoicemailAccount> {
    self
      .lock()
      .voicemail
      .iter()
      .find(|v| same_account(&v.alias, alias))
      .cloned()
  }

  /// Reject every call of `action`.
  pub fn reject(&self, action: &str, reason: &str) -> &Self {
    self.push_rejection(action, None, None, reason)
  }

  /// Reject the first `times` calls of `action`.
  pub fn reject_times(&self, action: &str, times: usize, reason: &str) -> &Self {
    self.push_rejection(action, None, Some(times), reason)
  }

  /// Reject calls of `action` whose `field` parameter equals `value`.
  pub fn reject_when(&self, action: &str, field: &str, value: &str, reason: &str) -> &Self {
    self.push_rejection(action, Some((field.to_owned(), value.to_owned())), None, reason)
  }

  fn push_rejection(
    &self,
    action: &str,
    field: Option<(String, String)>,
    remaining: Option<usize>,
    reason: &str,
  ) -> &Self {
    self.lock().rejections.push(Rejection {
      action: action.to_owned(),
      field,
      remaining,
      reason: reason.to_owned(),
    });
    self
  }

  fn answer(&self, query: &str, params: &Params) -> Result<Vec<Row>, FakeError> {
    let mut state = self.lock();
    state.lookups.push(query.to_owned());

    let text = |name: &str| params.get(name).and_then(Value::as_str).unwrap_or_default().to_owned();
    let number = |name: &str| params.get(name).and_then(Value::as_i64);

    let found = match query {
      "GetDirectoryUser" => {
        let account = text("sAMAccountName");
        rows(state.directory.iter().filter(|d| same_account(&d.account_name, &account)))
      }
      "GetCallManagerLine" => {
        let id = text("UUID");
        rows(state.lines.iter().filter(|l| l.uuid == id))
      }
      "GetCallManagerPhone" => {
        let id = text("UUID");
        rows(state.phones.iter().filter(|p| p.has_id(&id)))
      }
      "GetCallManagerUserDevices" => {
        let owner = text("UserId");
        rows(state.phones.iter().filter(|p| {
          p.owner.as_deref().is_some_and(|o| same_account(o, &owner))
        }))
      }
      "GetCallManagerUser" => {
        let user = text("UserId");
        rows(state.users.iter().filter(|u| {
          u.userid.as_deref().is_some_and(|id| same_account(id, &user))
        }))
      }
      "GetBuilding" => {
        let id = number("BuildingID");
        rows(state.buildings.iter().filter(|b| Some(b.building_id) == id))
      }
      "GetPhoneTemplates" => {
        let id = number("BuildingID");
        rows(state.templates.iter().filter(|t| Some(t.building_id) == id))
      }
      "GetVoicemailUser" => {
        let alias = text("Alias");
        rows(state.voicemail.iter().filter(|v| same_account(&v.alias, &alias)))
      }
      "GetVoicemailUserByExtension" => {
        let extension = text("DtmfAccessId");
        rows(
          state
            .voicemail
            .iter()
            .filter(|v| v.extension.as_deref() == Some(extension.as_str())),
        )
      }
      "GetParkedMailboxes" => {
        let mut found = rows(state.parked.iter());
        found.extend(state.raw_parked.iter().cloned());
        found
      }
      other => return Err(FakeError::UnknownQuery(other.to_owned())),
    };

    Ok(found)
  }

  fn apply(&self, system: &str, action: &str, params: Params) -> Result<Row, FakeError> {
    let mut state = self.lock();

    state.calls.push(Call {
      system: system.to_owned(),
      action: action.to_owned(),
      params: params.clone(),
    });

    if let Some(rule) = state.rejections.iter_mut().find(|r| r.applies(action, &params)) {
      if let Some(remaining) = rule.remaining.as_mut() {
        *remaining -= 1;
      }
      return Err(FakeError::Rejected {
        action: action.to_owned(),
        reason: rule.reason.clone(),
      });
    }

    let text = |name: &str| params.get(name).and_then(Value::as_str).unwrap_or_default().to_owned();

    let result = match action {
      "EndUsersCreate" => {
        let pkid = state.next_id("pk");
        state.users.push(CallManagerUser { pkid: pkid.clone(), userid: Some(text("userid")) });
        json!({ "pkid": pkid })
      }
      "PhonesDelete" => {
        let uuid = text("uuid");
        state.phones.retain(|p| !p.has_id(&uuid));
        state.device_map.remove(&uuid);
        Value::Null
      }
      "EndUserDeviceMapsDelete" => {
        let userid = text("userid");
        if let Some(users) = state.device_map.get_mut(&text("fkdevice")) {
          users.retain(|u| !same_account(u, &userid));
        }
        Value::Null
      }
      "EndUserDeviceMapsCreate" => {
        let users = state.device_map.entry(text("fkdevice")).or_default();
        if text("removeAllUsersForDevice") == "True" {
          users.clear();
        }
        users.push(text("fkenduser"));
        Value::Null
      }
      "PhonesUpdate" => {
        let uuid = text("uuid");
        let owner = params
          .get("ownerUserName_text")
          .or_else(|| params.get("ownerUserName"))
          .and_then(Value::as_str)
          .map(str::to_owned);
        if let Some(phone) = state.phones.iter_mut().find(|p| p.has_id(&uuid)) {
          if owner.is_some() {
            phone.owner = owner;
          }
        }
        if text("removeAllUsersForDevice") == "True" {
          state.device_map.remove(&uuid);
        }
        Value::Null
      }
      "userCreate" => {
        let object_id = state.next_id("vm");
        let call_handler = state.next_id("ch");
        state.voicemail.push(VoicemailAccount {
          object_id:    object_id.clone(),
          alias:        text("Alias"),
          extension:    Some(text("DtmfAccessId")),
          call_handler: Some(call_handler),
        });
        json!({ "ObjectId": object_id })
      }
      "userUpdate" => {
        let object_id = text("ObjectId");
        let extension = text("DtmfAccessId");
        if let Some(account) = state.voicemail.iter_mut().find(|v| v.object_id == object_id) {
          account.extension = Some(extension);
        }
        Value::Null
      }
      "UserUpdate" => {
        let guid = text("objectGUID");
        if let Some(identity) = state.directory.iter_mut().find(|d| d.object_guid == guid) {
          identity.ip_phone = Some(text("ipPhone"));
          identity.telephone_number = Some(text("telephoneNumber"));
        }
        Value::Null
      }
      "MailboxParkingCreate" => {
        let record: ParkedExtensionRecord = serde_json::from_value(Value::Object(params))
          .map_err(|_| FakeError::Malformed(action.to_owned()))?;
        if state.parked.iter().any(|p| !p.deleted && p.extension == record.extension) {
          return Err(FakeError::Rejected {
            action: action.to_owned(),
            reason: format!("extension {} is already parked", record.extension),
          });
        }
        state.parked.push(record);
        Value::Null
      }
      "MailboxParkingDelete" => {
        let extension = text("UnityUserExtension");
        let held = state.parked.iter_mut().find(|p| !p.deleted && p.extension == extension);
        match held {
          Some(record) => record.deleted = true,
          None => {
            return Err(FakeError::Rejected {
              action: action.to_owned(),
              reason: format!("extension {extension} is not parked"),
            });
          }
        }
        Value::Null
      }
      _ => Value::Null,
    };

    Ok(result)
  }
}

fn rows<'a, T: Serialize + 'a>(items: impl Iterator<Item = &'a T>) -> Vec<Row> {
  items.filter_map(|item| serde_json::to_value(item).ok()).collect()
}

impl Lookup for FakeBackend {
  type Error = FakeError;

  async fn lookup<'a>(&'a self, query: &'a str, params: Params) -> Result<Vec<Row>, FakeError> {
    self.answer(query, &params)
  }
}

impl Action for FakeBackend {
  type Error = FakeError;

  async fn run<'a>(
    &'a self,
    system: &'a str,
    action: &'a str,
    params: Params,
  ) -> Result<Row, FakeError> {
    self.apply(system, action, params)
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// A directory account with names, mail and a stable guid derived from
/// `account`.
pub fn identity(account: &str) -> DirectoryIdentity {
  let mut given = account.to_owned();
  if let Some(first) = given.get_mut(..1) {
    first.make_ascii_uppercase();
  }
  DirectoryIdentity {
    object_guid:      format!("guid-{account}"),
    account_name:     account.to_owned(),
    given_name:       Some(given),
    surname:          Some("Example".to_owned()),
    display_name:     None,
    mail:             Some(format!("{account}@example.com")),
    department:       None,
    ip_phone:         None,
    telephone_number: None,
  }
}

pub fn device(pkid: &str, name: &str, owner: Option<&str>) -> Device {
  Device {
    pkid:  pkid.to_owned(),
    name:  name.to_owned(),
    owner: owner.map(str::to_owned),
  }
}

/// Line `id` with dialable `pattern`, shown on device `device_pkid`.
pub fn line(id: &str, pattern: &str, device_pkid: &str) -> Line {
  Line {
    uuid:           id.to_owned(),
    dirn_uuid:      format!("dirn-{id}"),
    index:          "1".to_owned(),
    pattern:        pattern.to_owned(),
    partition:      Some("pt-internal".to_owned()),
    partition_text: Some("Internal".to_owned()),
    device_pkid:    device_pkid.to_owned(),
  }
}

pub fn voicemail(object_id: &str, alias: &str, extension: &str) -> VoicemailAccount {
  VoicemailAccount {
    object_id:    object_id.to_owned(),
    alias:        alias.to_owned(),
    extension:    Some(extension.to_owned()),
    call_handler: Some(format!("ch-{object_id}")),
  }
}

/// A building with a template and call schedule and transfer rules off.
pub fn building(id: i64) -> BuildingPolicy {
  BuildingPolicy {
    building_id:                id,
    voicemail_template:         Some("StandardTemplate".to_owned()),
    call_schedule:              Some(format!("sched-{id}")),
    transfer_rules_enabled:     false,
    standard_transfer_action:   Some(1),
    standard_transfer_enabled:  true,
    closed_transfer_action:     Some(0),
    closed_transfer_enabled:    false,
    alternate_transfer_action:  None,
    alternate_transfer_enabled: false,
  }
}

pub fn template(id: &str, building_id: i64) -> PhoneTemplate {
  PhoneTemplate {
    id:                      id.to_owned(),
    building_id,
    universal_template_uuid: Some(format!("udt-{id}")),
    product_enum:            Some("503".to_owned()),
  }
}
