//! Typed payloads for the [`Action`](crate::collab::Action) collaborator.
//!
//! One struct per remote procedure. Required fields are plain values;
//! optional ones carry their documented default in the constructor, so a
//! payload is validated once, when it is built, rather than coalesced inline
//! at every call site.

use serde::{Deserialize, Serialize, de::DeserializeOwned, de::IgnoredAny};

use crate::{
  config::System,
  model::{DirectoryIdentity, ParkedExtensionRecord, TransferOption},
  wire::{lower_bool, title_bool},
};

/// A named mutation against one backend system.
pub trait ActionRequest: Serialize + Send + Sync {
  const SYSTEM: System;
  const NAME: &'static str;

  /// What the action returns. Most actions return nothing of interest and
  /// use [`IgnoredAny`].
  type Output: DeserializeOwned + Send;
}

macro_rules! action {
  ($name:ident => $system:ident, $action:literal) => {
    action!($name => $system, $action, IgnoredAny);
  };
  ($name:ident => $system:ident, $action:literal, $output:ty) => {
    impl ActionRequest for $name {
      const SYSTEM: System = System::$system;
      const NAME: &'static str = $action;

      type Output = $output;
    }
  };
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// Set both denormalised phone attributes of a directory account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateDirectoryPhone {
  #[serde(rename = "objectGUID")]
  pub object_guid:      String,
  #[serde(rename = "ipPhone")]
  pub ip_phone:         String,
  #[serde(rename = "telephoneNumber")]
  pub telephone_number: String,
}

impl UpdateDirectoryPhone {
  /// Point both `ipPhone` and `telephoneNumber` at `extension`.
  pub fn new(identity: &DirectoryIdentity, extension: &str) -> Self {
    Self {
      object_guid:      identity.object_guid.clone(),
      ip_phone:         extension.to_owned(),
      telephone_number: extension.to_owned(),
    }
  }
}

action!(UpdateDirectoryPhone => Directory, "UserUpdate");

// ─── Call manager ────────────────────────────────────────────────────────────

/// Delete a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletePhone {
  pub uuid: String,
  pub name: String,
}

action!(DeletePhone => CallManager, "PhonesDelete");

/// Remove one user's association with a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteDeviceUserMap {
  pub fkdevice: String,
  pub userid:   String,
}

action!(DeleteDeviceUserMap => CallManager, "EndUserDeviceMapsDelete");

/// Create an end user. Names default to empty when the directory has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateEndUser {
  pub firstname: String,
  pub lastname:  String,
  pub userid:    String,
}

impl CreateEndUser {
  pub fn from_identity(identity: &DirectoryIdentity) -> Self {
    Self {
      firstname: identity.given_name.clone().unwrap_or_default(),
      lastname:  identity.surname.clone().unwrap_or_default(),
      userid:    identity.account_name.clone(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedEndUser {
  pub pkid: String,
}

action!(CreateEndUser => CallManager, "EndUsersCreate", CreatedEndUser);

/// Relabel a directory number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateLine {
  pub uuid:                String,
  pub description:         String,
  #[serde(rename = "alertingName")]
  pub alerting_name:       String,
  #[serde(rename = "asciiAlertingName")]
  pub ascii_alerting_name: String,
}

action!(UpdateLine => CallManager, "LinesUpdate");

/// Relabel the appearance of a line on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePhoneLine {
  pub uuid:           String,
  pub phone_uuid:     String,
  pub index:          String,
  pub dirn_pattern:   String,
  /// Defaults to empty when the line has no partition.
  #[serde(rename = "dirn_routePartitionName_text")]
  pub partition_text: String,
  pub label:          String,
  pub display:        String,
  #[serde(rename = "e164Mask")]
  pub e164_mask:      String,
}

action!(UpdatePhoneLine => CallManager, "PhoneLinesUpdate");

/// Make `owner` the device owner, optionally dropping every other mapped user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignPhoneOwner {
  pub uuid:             String,
  #[serde(rename = "ownerUserName_text")]
  pub owner:            String,
  #[serde(rename = "removeAllUsersForDevice", serialize_with = "title_bool")]
  pub remove_all_users: bool,
}

action!(AssignPhoneOwner => CallManager, "PhonesUpdate");

/// Second ownership field on the device record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetPhoneOwnerName {
  pub uuid:  String,
  #[serde(rename = "ownerUserName")]
  pub owner: String,
}

action!(SetPhoneOwnerName => CallManager, "PhonesUpdate");

/// Replace a device's user mapping: remove every mapped user, then add one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceDeviceUserMap {
  pub fkdevice:         String,
  pub fkenduser:        String,
  /// Association type; `1` is the controlling user.
  pub tkuserassociation: String,
  #[serde(rename = "removeAllUsersForDevice", serialize_with = "title_bool")]
  pub remove_all_users: bool,
}

impl ReplaceDeviceUserMap {
  pub fn new(device_pkid: &str, user_pkid: &str) -> Self {
    Self {
      fkdevice:          device_pkid.to_owned(),
      fkenduser:         user_pkid.to_owned(),
      tkuserassociation: "1".to_owned(),
      remove_all_users:  true,
    }
  }
}

action!(ReplaceDeviceUserMap => CallManager, "EndUserDeviceMapsCreate");

// ─── Voicemail ───────────────────────────────────────────────────────────────

/// Move a voicemail account to another extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateVoicemailExtension {
  #[serde(rename = "ObjectId")]
  pub object_id: String,
  #[serde(rename = "DtmfAccessId")]
  pub extension: String,
}

action!(UpdateVoicemailExtension => Voicemail, "userUpdate");

/// Create a voicemail account for a directory identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateVoicemailUser {
  #[serde(rename = "Alias")]
  pub alias:                String,
  #[serde(rename = "EmailAddress")]
  pub email:                String,
  #[serde(rename = "FirstName")]
  pub first_name:           String,
  #[serde(rename = "LastName")]
  pub last_name:            String,
  /// `3` links the account to the directory, `0` leaves it standalone.
  #[serde(rename = "LdapType")]
  pub ldap_type:            String,
  #[serde(rename = "DtmfAccessId")]
  pub extension:            String,
  #[serde(rename = "TemplateAlias")]
  pub template_alias:       String,
  #[serde(rename = "CreateSmtpProxyFromCorp", serialize_with = "lower_bool")]
  pub smtp_proxy_from_corp: bool,
}

impl CreateVoicemailUser {
  /// Seed an account from directory attributes. Missing names, mail and
  /// template default to empty.
  pub fn new(
    alias: &str,
    identity: &DirectoryIdentity,
    extension: &str,
    template_alias: Option<&str>,
    ldap_linked: bool,
  ) -> Self {
    Self {
      alias:                alias.to_owned(),
      email:                identity.mail().unwrap_or_default().to_owned(),
      first_name:           identity.given_name.clone().unwrap_or_default(),
      last_name:            identity.surname.clone().unwrap_or_default(),
      ldap_type:            if ldap_linked { "3" } else { "0" }.to_owned(),
      extension:            extension.to_owned(),
      template_alias:       template_alias.unwrap_or_default().to_owned(),
      smtp_proxy_from_corp: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedVoicemailUser {
  #[serde(rename = "ObjectId")]
  pub object_id: String,
}

action!(CreateVoicemailUser => Voicemail, "userCreate", CreatedVoicemailUser);

/// Attach an SMTP proxy address to a voicemail account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateSmtpProxyAddress {
  #[serde(rename = "SmtpAddress")]
  pub smtp_address: String,
  #[serde(rename = "ObjectGlobalUserObjectId")]
  pub object_id:    String,
}

action!(CreateSmtpProxyAddress => Voicemail, "SmtpproxyaddressesCreate");

/// Bind a voicemail account to a unified-messaging external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateExternalServiceAccount {
  #[serde(rename = "ExternalServiceObjectId")]
  pub service_id:           String,
  #[serde(rename = "EnableCalendarCapability", serialize_with = "lower_bool")]
  pub calendar:             bool,
  #[serde(rename = "LoginType")]
  pub login_type:           String,
  #[serde(rename = "EnableMailboxSynchCapability", serialize_with = "lower_bool")]
  pub mailbox_sync:         bool,
  #[serde(rename = "EmailAddressUseCorp", serialize_with = "lower_bool")]
  pub email_use_corp:       bool,
  #[serde(rename = "SubscriberObjectId")]
  pub subscriber_object_id: String,
}

impl CreateExternalServiceAccount {
  /// Calendar and mailbox sync on, corporate address, default login type.
  pub fn new(service_id: &str, subscriber_object_id: &str) -> Self {
    Self {
      service_id:           service_id.to_owned(),
      calendar:             true,
      login_type:           "0".to_owned(),
      mailbox_sync:         true,
      email_use_corp:       true,
      subscriber_object_id: subscriber_object_id.to_owned(),
    }
  }
}

action!(CreateExternalServiceAccount => Voicemail, "usersexternalserviceaccountsCreate");

/// Point a call handler at a schedule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCallHandlerSchedule {
  #[serde(rename = "ObjectId")]
  pub call_handler: String,
  #[serde(rename = "ScheduleSetObjectId")]
  pub schedule_set: String,
}

action!(UpdateCallHandlerSchedule => Voicemail, "userscallhandlersUpdate");

/// Overwrite one transfer-option record on a call handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateTransferOption {
  #[serde(rename = "TransferOptionType")]
  pub option:       TransferOption,
  #[serde(rename = "Action")]
  pub action:       i64,
  #[serde(rename = "Enabled")]
  pub enabled:      bool,
  #[serde(rename = "CallHandlerObjectId")]
  pub call_handler: String,
}

action!(UpdateTransferOption => Voicemail, "callhandlertransferoptionsUpdate");

// ─── Internal audit ──────────────────────────────────────────────────────────

/// Append a parked-extension audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RecordParkedMailbox(pub ParkedExtensionRecord);

action!(RecordParkedMailbox => Audit, "MailboxParkingCreate");

/// Release the active parked record holding an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseParkedMailbox {
  #[serde(rename = "UnityUserExtension")]
  pub extension: String,
}

action!(ReleaseParkedMailbox => Audit, "MailboxParkingDelete");
