//! Network variant table and request routing
//!
//! Every per-network difference (URL namespace, body field names, room
//! permission, token subject shape) lives in one [`NetworkProfile`] entry.
//! The client picks its entry once at construction and never branches on the
//! network again.

use entsync_domain::{EntitlementRecord, EntsyncError, Network, PermissionRecord, Result};
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::warn;

/// JSON field names used by one network's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldNames {
    pub user_key: &'static str,
    pub type_field: &'static str,
    pub email: &'static str,
    pub display_name: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub permission_name: &'static str,
    pub permissions: &'static str,
}

/// Path templates. `{id}`, `{type}` and `{query}` are substituted with
/// percent-encoded values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTemplates {
    pub entitlements: &'static str,
    pub entitlement: &'static str,
    pub find: &'static str,
    pub permissions: Option<&'static str>,
    pub all_permissions: Option<&'static str>,
}

/// One row of the variant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkProfile {
    pub network: Network,
    /// Value written to the type field (e.g. `WHATSAPPGROUPS`)
    pub entitlement_type: &'static str,
    /// Key of the record collection in a listing page
    pub collection: &'static str,
    pub fields: FieldNames,
    pub paths: PathTemplates,
    pub room_permission: Option<&'static str>,
    /// Token subject is `ces:customer:<keyId>:<podId>` instead of
    /// `ces:customer:<keyId>`
    pub subject_includes_pod: bool,
}

static WHATSAPP: NetworkProfile = NetworkProfile {
    network: Network::WhatsApp,
    entitlement_type: "WHATSAPPGROUPS",
    collection: "entitlements",
    fields: FieldNames {
        user_key: "symphonyId",
        type_field: "entitlementType",
        email: "emailAddress",
        display_name: "displayName",
        first_name: "firstName",
        last_name: "lastName",
        permission_name: "permissionName",
        permissions: "permissions",
    },
    paths: PathTemplates {
        entitlements: "/admin/api/v1/customer/entitlements",
        entitlement: "/admin/api/v1/customer/entitlements/{id}/entitlementType/{type}",
        find: "/admin/api/v1/customer/entitlements/search?query={query}",
        permissions: None,
        all_permissions: None,
    },
    room_permission: None,
    subject_includes_pod: false,
};

static WECHAT: NetworkProfile = NetworkProfile {
    network: Network::WeChat,
    entitlement_type: "WECHAT",
    collection: "entitlements",
    fields: FieldNames {
        user_key: "advisorEmailAddress",
        type_field: "externalNetwork",
        email: "advisorEmailAddress",
        display_name: "displayName",
        first_name: "firstName",
        last_name: "lastName",
        permission_name: "permissionName",
        permissions: "permissions",
    },
    paths: PathTemplates {
        entitlements: "/wechatgateway/api/v1/customer/advisors",
        entitlement: "/wechatgateway/api/v1/customer/advisors/{id}",
        find: "/wechatgateway/api/v1/customer/advisors/search?query={query}",
        permissions: Some("/wechatgateway/api/v1/customer/advisors/{id}/permissions"),
        all_permissions: Some("/wechatgateway/api/v1/customer/permissions"),
    },
    room_permission: Some("create:room"),
    subject_includes_pod: true,
};

impl NetworkProfile {
    pub fn for_network(network: Network) -> &'static Self {
        match network {
            Network::WhatsApp => &WHATSAPP,
            Network::WeChat => &WECHAT,
        }
    }
}

/// A logical remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    List,
    Add(&'a str),
    Delete(&'a str),
    Get(&'a str),
    Find(&'a str),
    AddPermission { identifier: &'a str, permission: &'a str },
    ListPermissions(&'a str),
    ListAllPermissions,
}

impl Operation<'_> {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Add(_) => "add",
            Self::Delete(_) => "delete",
            Self::Get(_) => "get",
            Self::Find(_) => "find",
            Self::AddPermission { .. } => "add-permission",
            Self::ListPermissions(_) => "list-permissions",
            Self::ListAllPermissions => "list-all-permissions",
        }
    }
}

/// Concrete request for one operation, relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ResolvedEndpoint {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::GET, path: path.into(), body: None }
    }
}

/// One decoded listing page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<EntitlementRecord>,
    /// Items dropped because they had no user key
    pub skipped: usize,
    /// Raw `pagination.next` fragment
    pub next: Option<String>,
}

impl Page {
    /// Whether the page's collection held no items at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.skipped == 0
    }
}

/// Maps operations to paths and bodies for a single network.
#[derive(Debug, Clone, Copy)]
pub struct EndpointResolver {
    profile: &'static NetworkProfile,
}

impl EndpointResolver {
    pub fn new(network: Network) -> Self {
        Self { profile: NetworkProfile::for_network(network) }
    }

    pub fn network(&self) -> Network {
        self.profile.network
    }

    pub fn profile(&self) -> &'static NetworkProfile {
        self.profile
    }

    /// Resolve an operation to a method, path and optional JSON body.
    ///
    /// # Errors
    /// Returns `EntsyncError::Unsupported` for operations the network does
    /// not offer.
    pub fn resolve(&self, operation: Operation<'_>) -> Result<ResolvedEndpoint> {
        let profile = self.profile;
        let paths = &profile.paths;

        let endpoint = match operation {
            Operation::List => ResolvedEndpoint::get(paths.entitlements),
            Operation::Add(id) => ResolvedEndpoint {
                method: Method::POST,
                path: paths.entitlements.to_string(),
                body: Some(self.body(&[
                    (profile.fields.type_field, profile.entitlement_type),
                    (profile.fields.user_key, id),
                ])),
            },
            Operation::Delete(id) => ResolvedEndpoint {
                method: Method::DELETE,
                path: self.fill(paths.entitlement, Some(id), None),
                body: None,
            },
            Operation::Get(id) => ResolvedEndpoint::get(self.fill(paths.entitlement, Some(id), None)),
            Operation::Find(query) => ResolvedEndpoint::get(self.fill(paths.find, None, Some(query))),
            Operation::AddPermission { identifier, permission } => {
                let template = self.require(paths.permissions, operation)?;
                ResolvedEndpoint {
                    method: Method::POST,
                    path: self.fill(template, Some(identifier), None),
                    body: Some(self.body(&[
                        (profile.fields.user_key, identifier),
                        (profile.fields.type_field, profile.entitlement_type),
                        (profile.fields.permission_name, permission),
                    ])),
                }
            }
            Operation::ListPermissions(id) => {
                let template = self.require(paths.permissions, operation)?;
                ResolvedEndpoint::get(self.fill(template, Some(id), None))
            }
            Operation::ListAllPermissions => {
                ResolvedEndpoint::get(self.require(paths.all_permissions, operation)?)
            }
        };

        Ok(endpoint)
    }

    /// Listing path followed by the server's `pagination.next` fragment.
    pub fn next_page_path(&self, next: &str) -> String {
        format!("{}{}", self.profile.paths.entitlements, next)
    }

    /// Decode one listing page.
    ///
    /// A page without a collection counts as empty. Items without a user key
    /// are skipped with a warning.
    ///
    /// # Errors
    /// Returns `EntsyncError::Pagination` when the body is not a JSON object
    /// or the collection is not an array.
    pub fn decode_page(&self, body: &Value) -> Result<Page> {
        let Value::Object(map) = body else {
            return Err(EntsyncError::Pagination("listing page is not a JSON object".into()));
        };

        let items = match map.get(self.profile.collection) {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(EntsyncError::Pagination(format!(
                    "listing field '{}' is not an array",
                    self.profile.collection
                )))
            }
        };

        let mut page = Page::default();
        for item in items {
            match self.decode_record(item) {
                Some(record) => page.records.push(record),
                None => {
                    warn!(
                        network = %self.profile.network,
                        user_key = self.profile.fields.user_key,
                        "skipping listing item without user key"
                    );
                    page.skipped += 1;
                }
            }
        }

        page.next = map
            .get("pagination")
            .and_then(|p| p.get("next"))
            .and_then(Value::as_str)
            .filter(|next| !next.is_empty())
            .map(str::to_string);

        Ok(page)
    }

    /// Decode a listing item; `None` when it lacks the user key.
    pub fn decode_record(&self, item: &Value) -> Option<EntitlementRecord> {
        let fields = &self.profile.fields;
        let user_id = text(item, fields.user_key)?;

        let permissions = item
            .get(fields.permissions)
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|entry| match entry {
                        Value::String(name) => Some(name.clone()),
                        other => text(other, fields.permission_name),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(EntitlementRecord {
            user_id,
            network: self.profile.network,
            entitlement_type: text(item, fields.type_field)
                .unwrap_or_else(|| self.profile.entitlement_type.to_string()),
            first_name: text(item, fields.first_name),
            last_name: text(item, fields.last_name),
            display_name: text(item, fields.display_name),
            email: text(item, fields.email),
            permissions,
        })
    }

    /// Decode a permission listing.
    ///
    /// Accepts a bare array or an object carrying the permissions array.
    /// Entries are plain names or objects with the permission name field.
    /// Entries name their owner through the user key; the rest belong to
    /// `owner`, and are dropped when there is none.
    pub fn decode_permissions(&self, body: &Value, owner: Option<&str>) -> Vec<PermissionRecord> {
        let fields = &self.profile.fields;
        let entries = match body {
            Value::Array(list) => list.as_slice(),
            Value::Object(map) => match map.get(fields.permissions).and_then(Value::as_array) {
                Some(list) => list.as_slice(),
                None => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        let default_owner = owner.map(str::to_string).or_else(|| text(body, fields.user_key));

        entries
            .iter()
            .filter_map(|entry| {
                let (permission, owner) = match entry {
                    Value::String(name) if !name.is_empty() => {
                        (name.clone(), default_owner.clone())
                    }
                    other => (
                        text(other, fields.permission_name)?,
                        text(other, fields.user_key).or_else(|| default_owner.clone()),
                    ),
                };
                Some(PermissionRecord { owner: owner?, permission, network: self.profile.network })
            })
            .collect()
    }

    fn require(
        &self,
        template: Option<&'static str>,
        operation: Operation<'_>,
    ) -> Result<&'static str> {
        template.ok_or_else(|| {
            EntsyncError::Unsupported(format!(
                "{} is not supported on network {}",
                operation.name(),
                self.profile.network
            ))
        })
    }

    fn fill(&self, template: &str, id: Option<&str>, query: Option<&str>) -> String {
        let mut path = template.replace("{type}", self.profile.entitlement_type);
        if let Some(id) = id {
            path = path.replace("{id}", &urlencoding::encode(id));
        }
        if let Some(query) = query {
            path = path.replace("{query}", &urlencoding::encode(query));
        }
        path
    }

    fn body(&self, pairs: &[(&str, &str)]) -> Value {
        let map: Map<String, Value> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), Value::String((*value).to_string())))
            .collect();
        Value::Object(map)
    }
}

fn text(item: &Value, field: &str) -> Option<String> {
    match item.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
