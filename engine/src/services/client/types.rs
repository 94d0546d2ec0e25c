use serde::{Deserialize, Serialize};

/// Normalized item category, produced once at ingestion.
///
/// Every category string coming off the wire is folded into this enum
/// exactly once; downstream code matches on variants, never on raw labels.
/// `Custom` is the single tag for anything the primary API cannot create
/// (the sentinel labels and any label we do not recognize), and is what
/// routes an item through the external-CLI bridge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Login,
    Password,
    SecureNote,
    CreditCard,
    Identity,
    Document,
    SshKey,
    ApiCredential,
    Custom,
}

impl Category {
    /// True for the canonical custom tag that must go through the bridge.
    pub fn is_custom(&self) -> bool {
        matches!(self, Category::Custom)
    }

    /// Canonical wire label for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Login => "LOGIN",
            Category::Password => "PASSWORD",
            Category::SecureNote => "SECURE_NOTE",
            Category::CreditCard => "CREDIT_CARD",
            Category::Identity => "IDENTITY",
            Category::Document => "DOCUMENT",
            Category::SshKey => "SSH_KEY",
            Category::ApiCredential => "API_CREDENTIAL",
            Category::Custom => "CUSTOM",
        }
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "LOGIN" => Category::Login,
            "PASSWORD" => Category::Password,
            "SECURE_NOTE" | "SECURENOTE" => Category::SecureNote,
            "CREDIT_CARD" | "CREDITCARD" => Category::CreditCard,
            "IDENTITY" => Category::Identity,
            "DOCUMENT" => Category::Document,
            "SSH_KEY" | "SSHKEY" => Category::SshKey,
            "API_CREDENTIAL" | "APICREDENTIAL" => Category::ApiCredential,
            // Sentinel labels for items the primary API cannot express,
            // plus anything we do not recognize at all.
            _ => Category::Custom,
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

/// Field type as accepted by the destination tenant.
///
/// Unrecognized wire strings are preserved in `Other` so the transcoder can
/// downgrade them to `Text` with the original label in the warning.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Concealed,
    Otp,
    Address,
    KeyPair,
    Date,
    MonthYear,
    Email,
    Url,
    Phone,
    CreditCardType,
    CreditCardNumber,
    Menu,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Concealed => "CONCEALED",
            FieldType::Otp => "OTP",
            FieldType::Address => "ADDRESS",
            FieldType::KeyPair => "KEY_PAIR",
            FieldType::Date => "DATE",
            FieldType::MonthYear => "MONTH_YEAR",
            FieldType::Email => "EMAIL",
            FieldType::Url => "URL",
            FieldType::Phone => "PHONE",
            FieldType::CreditCardType => "CREDIT_CARD_TYPE",
            FieldType::CreditCardNumber => "CREDIT_CARD_NUMBER",
            FieldType::Menu => "MENU",
            FieldType::Other(raw) => raw,
        }
    }
}

impl From<String> for FieldType {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "TEXT" | "STRING" => FieldType::Text,
            "CONCEALED" => FieldType::Concealed,
            "OTP" | "TOTP" => FieldType::Otp,
            "ADDRESS" => FieldType::Address,
            "KEY_PAIR" | "KEYPAIR" | "SSHKEY" => FieldType::KeyPair,
            "DATE" => FieldType::Date,
            "MONTH_YEAR" | "MONTHYEAR" => FieldType::MonthYear,
            "EMAIL" => FieldType::Email,
            "URL" => FieldType::Url,
            "PHONE" => FieldType::Phone,
            "CREDIT_CARD_TYPE" => FieldType::CreditCardType,
            "CREDIT_CARD_NUMBER" => FieldType::CreditCardNumber,
            "MENU" => FieldType::Menu,
            _ => FieldType::Other(raw),
        }
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

/// One vault as listed by a tenant.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Vault {
    pub id: String,
    pub name: String,
    #[serde(rename = "itemCount", skip_serializing_if = "Option::is_none")]
    pub item_count: Option<u32>,
}

/// One page of the vault list.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VaultListResponse {
    pub vaults: Vec<Vault>,
    pub cursor: Option<String>,
}

/// Lightweight item listing entry; full contents come from `get_item`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ItemSummary {
    pub id: String,
    pub title: String,
    pub category: Option<Category>,
}

impl ItemSummary {
    /// Category with the absent case defaulted to the login-like category.
    pub fn effective_category(&self) -> Category {
        self.category.clone().unwrap_or(Category::Login)
    }
}

/// One page of the item list.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ItemListResponse {
    pub items: Vec<ItemSummary>,
    pub cursor: Option<String>,
}

/// A field's section assignment and composite details both ride on the
/// field itself; composite payloads (address, key pair) stay raw JSON and
/// are interpreted by the transcoder based on the field type.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Field {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "sectionId", default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Named group of fields within an item.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Section {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// File attached to an item. `content` is base64 on the wire; the client
/// resolves it from the raw-bytes endpoint during `get_item`, so a `None`
/// after fetch means the payload read failed.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FileAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "fieldId", default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "sectionId", default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Saved website association on an item.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Website {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(
        rename = "autofillBehavior",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub autofill_behavior: Option<String>,
}

/// Full item as fetched from the source or written to the destination.
///
/// The trailing identity/audit fields exist only on source reads; the
/// transcoder clears them so item creation never echoes source identity.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(rename = "vaultId")]
    pub vault_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub websites: Vec<Website>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(
        rename = "lastEditedBy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_edited_by: Option<String>,
}

impl Item {
    /// Category with the absent case defaulted to the login-like category.
    pub fn effective_category(&self) -> Category {
        self.category.clone().unwrap_or(Category::Login)
    }
}

/// Nested address composite carried in `Field::details`.
///
/// Serialization always emits every sub-field; deserialization defaults
/// missing sub-fields to the empty string, so a round trip through the
/// transcoder never drops a key.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AddressDetails {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub country: String,
}

/// Key-pair composite carried in `Field::details` of key fields.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct KeyPairDetails {
    #[serde(rename = "privateKey", default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(rename = "publicKey", default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Request body for destination vault creation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateVaultRequest {
    pub name: String,
}

/// Response body of a successful item creation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateItemResponse {
    pub id: String,
}

/// Identity probe used to verify a token during `authenticate`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WhoamiResponse {
    #[serde(rename = "accountId")]
    pub account_id: String,
    pub name: Option<String>,
}

/// Error body shape the tenant API uses when it has something to say.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiErrorBody {
    pub message: Option<String>,
}
