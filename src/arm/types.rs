//! CIAM directory resource model

use super::error::{ArmError, Result};
use super::location;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ARM provider namespace and resource type for CIAM directories
pub const PROVIDER_NAMESPACE: &str = "Microsoft.AzureActiveDirectory";
pub const RESOURCE_TYPE: &str = "ciamDirectories";

/// SKU tier sent when the caller does not pick one
pub const DEFAULT_SKU_TIER: &str = "A0";

pub type Tags = BTreeMap<String, String>;

/// Composite key of a directory resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    subscription_id: String,
    resource_group_name: String,
    domain_name: String,
}

impl ResourceIdentity {
    pub fn new(subscription_id: &str, resource_group_name: &str, domain_name: &str) -> Result<Self> {
        let subscription = uuid::Uuid::parse_str(subscription_id).map_err(|e| ArmError::InvalidIdentity {
            field: "subscription_id",
            reason: e.to_string(),
        })?;
        ensure_segment("resource_group_name", resource_group_name)?;
        ensure_segment("domain_name", domain_name)?;

        Ok(Self {
            subscription_id: subscription.hyphenated().to_string(),
            resource_group_name: resource_group_name.to_string(),
            domain_name: domain_name.to_string(),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group_name(&self) -> &str {
        &self.resource_group_name
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// Resource path below the ARM endpoint, without the api-version query
    pub fn resource_path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            urlencoding::encode(&self.subscription_id),
            urlencoding::encode(&self.resource_group_name),
            PROVIDER_NAMESPACE,
            RESOURCE_TYPE,
            urlencoding::encode(&self.domain_name),
        )
    }
}

fn ensure_segment(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ArmError::InvalidIdentity {
            field,
            reason: "must not be blank".to_string(),
        });
    }
    if value.contains('/') {
        return Err(ArmError::InvalidIdentity {
            field,
            reason: "must not contain '/'".to_string(),
        });
    }
    Ok(())
}

/// Full representation of a directory as returned by the control plane
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<TenantSku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<TenantProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSku {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_tenant_properties: Option<CreateTenantProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl Tenant {
    pub fn display_name(&self) -> Option<&str> {
        self.create_properties()?.display_name.as_deref()
    }

    pub fn country_code(&self) -> Option<&str> {
        self.create_properties()?.country_code.as_deref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.properties.as_ref()?.tenant_id.as_deref()
    }

    fn create_properties(&self) -> Option<&CreateTenantProperties> {
        self.properties.as_ref()?.create_tenant_properties.as_ref()
    }

    /// Names of create-only fields whose values differ between two states
    pub fn create_only_changes(&self, desired: &Tenant) -> Vec<&'static str> {
        let sku_name = |t: &Tenant| t.sku.as_ref().and_then(|s| s.name.clone());
        let sku_tier = |t: &Tenant| t.sku.as_ref().and_then(|s| s.tier.clone());

        let mut changed = Vec::new();
        if self.location != desired.location {
            changed.push("location");
        }
        if sku_name(self) != sku_name(desired) {
            changed.push("sku.name");
        }
        if sku_tier(self) != sku_tier(desired) {
            changed.push("sku.tier");
        }
        if self.display_name() != desired.display_name() {
            changed.push("displayName");
        }
        if self.country_code() != desired.country_code() {
            changed.push("countryCode");
        }
        changed
    }
}

/// PATCH body for an update. Tags are the only field the control plane
/// accepts after creation.
#[derive(Debug, Serialize)]
pub struct TagsPatch<'a> {
    pub tags: &'a Tags,
}

impl<'a> From<&'a Tenant> for TagsPatch<'a> {
    fn from(tenant: &'a Tenant) -> Self {
        static EMPTY: Tags = BTreeMap::new();
        Self {
            tags: tenant.tags.as_ref().unwrap_or(&EMPTY),
        }
    }
}

/// Caller input for a create
#[derive(Debug, Clone, PartialEq)]
pub struct NewTenant {
    /// Region name, one of [`location::LOCATIONS`]
    pub location: String,
    pub sku_name: String,
    pub sku_tier: Option<String>,
    pub display_name: String,
    pub tags: Tags,
}

impl NewTenant {
    pub fn new(location: &str, sku_name: &str, display_name: &str) -> Self {
        Self {
            location: location.to_string(),
            sku_name: sku_name.to_string(),
            sku_tier: None,
            display_name: display_name.to_string(),
            tags: Tags::new(),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Build the PUT body, resolving the region name to its country code
    pub fn to_request(&self) -> Result<Tenant> {
        let country_code = location::resolve(&self.location)?;

        Ok(Tenant {
            location: Some(self.location.clone()),
            sku: Some(TenantSku {
                name: Some(self.sku_name.clone()),
                tier: Some(
                    self.sku_tier
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SKU_TIER.to_string()),
                ),
            }),
            properties: Some(TenantProperties {
                create_tenant_properties: Some(CreateTenantProperties {
                    display_name: Some(self.display_name.clone()),
                    country_code: Some(country_code.as_str().to_string()),
                }),
                ..Default::default()
            }),
            tags: Some(self.tags.clone()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";

    fn sample_tenant() -> Tenant {
        let mut tenant = NewTenant::new("Europe", "Base", "Contoso")
            .with_tags(Tags::from([("env".to_string(), "prod".to_string())]))
            .to_request()
            .unwrap();
        tenant.id = Some("/subscriptions/x/.../contoso".to_string());
        tenant
    }

    #[test]
    fn identity_builds_resource_path() {
        let identity = ResourceIdentity::new(SUBSCRIPTION, "my-rg", "contoso.onmicrosoft.com").unwrap();
        assert_eq!(
            identity.resource_path(),
            "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/my-rg\
             /providers/Microsoft.AzureActiveDirectory/ciamDirectories/contoso.onmicrosoft.com"
        );
    }

    #[test]
    fn identity_encodes_segments() {
        let identity = ResourceIdentity::new(SUBSCRIPTION, "rg with space", "contoso").unwrap();
        assert!(identity.resource_path().contains("/resourceGroups/rg%20with%20space/"));
    }

    #[test]
    fn identity_rejects_bad_input() {
        assert!(matches!(
            ResourceIdentity::new("not-a-uuid", "rg", "contoso"),
            Err(ArmError::InvalidIdentity { field: "subscription_id", .. })
        ));
        assert!(matches!(
            ResourceIdentity::new(SUBSCRIPTION, "  ", "contoso"),
            Err(ArmError::InvalidIdentity { field: "resource_group_name", .. })
        ));
        assert!(matches!(
            ResourceIdentity::new(SUBSCRIPTION, "rg", "a/b"),
            Err(ArmError::InvalidIdentity { field: "domain_name", .. })
        ));
    }

    #[test]
    fn create_request_carries_resolved_country_code() {
        let body = serde_json::to_value(sample_tenant()).unwrap();
        assert_eq!(body["location"], "Europe");
        assert_eq!(body["sku"], json!({"name": "Base", "tier": "A0"}));
        assert_eq!(
            body["properties"]["createTenantProperties"],
            json!({"displayName": "Contoso", "countryCode": "EU"})
        );
        assert_eq!(body["tags"], json!({"env": "prod"}));
    }

    #[test]
    fn create_request_rejects_unknown_location() {
        let err = NewTenant::new("Mars", "Base", "Contoso").to_request().unwrap_err();
        assert!(matches!(err, ArmError::InvalidLocation(ref l) if l.input == "Mars"));
    }

    #[test]
    fn tags_patch_omits_create_only_fields() {
        let mut tenant = sample_tenant();
        tenant
            .properties
            .as_mut()
            .and_then(|p| p.create_tenant_properties.as_mut())
            .unwrap()
            .display_name = Some("Renamed".to_string());

        let body = serde_json::to_value(TagsPatch::from(&tenant)).unwrap();
        assert_eq!(body, json!({"tags": {"env": "prod"}}));
        for field in ["displayName", "location", "sku", "properties", "id"] {
            assert!(body.get(field).is_none(), "{field} leaked into patch");
        }
    }

    #[test]
    fn tags_patch_without_tags_sends_empty_map() {
        let body = serde_json::to_value(TagsPatch::from(&Tenant::default())).unwrap();
        assert_eq!(body, json!({"tags": {}}));
    }

    #[test]
    fn create_only_changes_detects_each_field() {
        let previous = sample_tenant();
        assert!(previous.create_only_changes(&previous.clone()).is_empty());

        let mut desired = previous.clone();
        desired.tags = Some(Tags::new());
        assert!(previous.create_only_changes(&desired).is_empty());

        desired.location = Some("Australia".to_string());
        desired.properties = Some(TenantProperties {
            create_tenant_properties: Some(CreateTenantProperties {
                display_name: Some("Contoso".to_string()),
                country_code: Some("AU".to_string()),
            }),
            ..Default::default()
        });
        assert_eq!(previous.create_only_changes(&desired), vec!["location", "countryCode"]);
    }

    #[test]
    fn deserializes_control_plane_body() {
        let body = json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.AzureActiveDirectory/ciamDirectories/contoso",
            "name": "contoso",
            "type": "Microsoft.AzureActiveDirectory/ciamDirectories",
            "location": "United States",
            "sku": {"name": "Base", "tier": "A0"},
            "properties": {
                "tenantId": "11111111-2222-3333-4444-555555555555",
                "domainName": "contoso.onmicrosoft.com",
                "provisioningState": "Succeeded",
                "billingConfig": {"billingType": "MAU"}
            },
            "tags": {"team": "identity"}
        });

        let tenant: Tenant = serde_json::from_value(body).unwrap();
        assert_eq!(tenant.tenant_id(), Some("11111111-2222-3333-4444-555555555555"));
        assert_eq!(tenant.sku.as_ref().and_then(|s| s.name.as_deref()), Some("Base"));
        assert_eq!(tenant.display_name(), None);
        assert_eq!(tenant.tags.unwrap()["team"], "identity");

        let round: Value = serde_json::from_value(json!({"tags": null})).unwrap();
        let tenant: Tenant = serde_json::from_value(round).unwrap();
        assert!(tenant.tags.is_none());
    }
}
