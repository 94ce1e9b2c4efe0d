//! Typed named queries for the [`Lookup`](crate::collab::Lookup) collaborator.
//!
//! Each query is a small serialisable struct whose fields become the named
//! parameters of the lookup, paired with the row type the lookup returns.

use serde::{Serialize, de::DeserializeOwned};

use crate::model::{
  BuildingPolicy, CallManagerUser, Device, DirectoryIdentity, Line,
  ParkedRosterEntry, PhoneTemplate, VoicemailAccount,
};

/// A named lookup with typed parameters and rows.
pub trait Query: Serialize + Send + Sync {
  /// Name the lookup collaborator knows this query by.
  const NAME: &'static str;
  /// Human-readable record name used in `NotFound` / `Ambiguous` errors.
  const ENTITY: &'static str;

  type Row: DeserializeOwned + Send;

  /// The key the query was issued for, for error messages and logs.
  fn key(&self) -> String;
}

macro_rules! query {
  (
    $(#[$meta:meta])*
    $name:ident { $field:ident: $ty:ty => $wire:literal }
    => $row:ty, $query_name:literal, $entity:literal
  ) => {
    $(#[$meta])*
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct $name {
      #[serde(rename = $wire)]
      pub $field: $ty,
    }

    impl $name {
      pub fn new($field: impl Into<$ty>) -> Self { Self { $field: $field.into() } }
    }

    impl Query for $name {
      const NAME: &'static str = $query_name;
      const ENTITY: &'static str = $entity;

      type Row = $row;

      fn key(&self) -> String { self.$field.to_string() }
    }
  };
}

query! {
  /// Directory account by account name.
  DirectoryUserByAccount { account: String => "sAMAccountName" }
  => DirectoryIdentity, "GetDirectoryUser", "directory user"
}

query! {
  /// A device-line association by id.
  LineById { id: String => "UUID" }
  => Line, "GetCallManagerLine", "call-manager line"
}

query! {
  /// A device by id.
  PhoneById { id: String => "UUID" }
  => Device, "GetCallManagerPhone", "call-manager phone"
}

query! {
  /// Every device associated with a call-manager user.
  DevicesByOwner { user_id: String => "UserId" }
  => Device, "GetCallManagerUserDevices", "associated device"
}

query! {
  /// A call-manager end user by user id.
  CallManagerUserById { user_id: String => "UserId" }
  => CallManagerUser, "GetCallManagerUser", "call-manager user"
}

query! {
  /// Building policy by building id.
  BuildingById { building_id: i64 => "BuildingID" }
  => BuildingPolicy, "GetBuilding", "building"
}

query! {
  /// Soft-phone templates attached to a building.
  PhoneTemplatesByBuilding { building_id: i64 => "BuildingID" }
  => PhoneTemplate, "GetPhoneTemplates", "phone template"
}

query! {
  /// Voicemail account by alias.
  VoicemailByAlias { alias: String => "Alias" }
  => VoicemailAccount, "GetVoicemailUser", "voicemail user"
}

query! {
  /// Voicemail account currently holding an extension.
  VoicemailByExtension { extension: String => "DtmfAccessId" }
  => VoicemailAccount, "GetVoicemailUserByExtension", "voicemail user"
}

/// Every extension recorded as parked so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParkedMailboxes;

impl Query for ParkedMailboxes {
  const NAME: &'static str = "GetParkedMailboxes";
  const ENTITY: &'static str = "parked mailbox";

  type Row = ParkedRosterEntry;

  fn key(&self) -> String { String::new() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parameters_use_backend_names() {
    let params = serde_json::to_value(VoicemailByExtension::new("4155")).unwrap();
    assert_eq!(params, serde_json::json!({ "DtmfAccessId": "4155" }));

    let params = serde_json::to_value(BuildingById::new(7)).unwrap();
    assert_eq!(params, serde_json::json!({ "BuildingID": 7 }));
  }

  #[test]
  fn parked_mailboxes_has_no_parameters() {
    let params = serde_json::to_value(ParkedMailboxes).unwrap();
    assert!(params.is_null());
  }
}
