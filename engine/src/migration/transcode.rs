//! Pure per-item conversion from the source tenant's shape to something the
//! destination will accept.
//!
//! No I/O happens here. Every lossy rewrite pushes a human-readable warning
//! that the orchestrator copies into the run log with vault and item
//! context attached.

use chrono::Utc;

use crate::services::client::types::{
    AddressDetails, Category, Field, FieldType, FileAttachment, Item, KeyPairDetails, Section,
    Website,
};

/// Section that collects fields and files with no home of their own.
pub const CATCH_ALL_SECTION: &str = "add more";

/// Destination rejects empty secure notes; blank ones get this instead.
const EMPTY_NOTE_PLACEHOLDER: &str = "(empty note)";

const DEFAULT_WEBSITE_LABEL: &str = "website";
const DEFAULT_AUTOFILL_BEHAVIOR: &str = "ANYWHERE_ON_WEBSITE";

/// Expiry sentinel for unparseable or absent month/year values.
const EXPIRY_SENTINEL: &str = "01/1970";

/// A converted item plus everything that was lost or rewritten on the way.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub item: Item,
    pub warnings: Vec<String>,
}

/// Convert one source item into its destination form, bound to
/// `dest_vault_id`.
pub fn transcode(source: &Item, dest_vault_id: &str) -> Transcoded {
    let mut warnings = Vec::new();
    let category = source.effective_category();

    let mut item = Item {
        id: None,
        title: source.title.clone(),
        vault_id: dest_vault_id.to_string(),
        category: Some(category.clone()),
        fields: Vec::new(),
        sections: source.sections.clone(),
        files: Vec::new(),
        tags: source.tags.clone(),
        websites: Vec::new(),
        notes: source.notes.clone(),
        version: None,
        created_at: None,
        updated_at: None,
        last_edited_by: None,
    };

    let card_item = category == Category::CreditCard;
    for field in &source.fields {
        item.fields.push(transcode_field(field, card_item, &mut warnings));
    }

    for (index, file) in source.files.iter().enumerate() {
        match &file.content {
            Some(content) => {
                let field_id = file
                    .field_id
                    .clone()
                    .unwrap_or_else(|| synthesized_file_field_id(&file.name, index));
                item.files.push(FileAttachment {
                    id: None,
                    field_id: Some(field_id),
                    name: file.name.clone(),
                    size: file.size,
                    section_id: Some(
                        file.section_id
                            .clone()
                            .unwrap_or_else(|| CATCH_ALL_SECTION.to_string()),
                    ),
                    content: Some(content.clone()),
                });
            }
            // The source read already failed for this payload; the item
            // still migrates, just without the attachment.
            None => warnings.push(format!(
                "file '{}' has no readable content; item migrated without this attachment",
                file.name
            )),
        }
    }

    ensure_referenced_sections(&mut item);

    if category == Category::SecureNote {
        let blank = item
            .notes
            .as_deref()
            .map(|notes| notes.trim().is_empty())
            .unwrap_or(true);
        if blank {
            item.notes = Some(EMPTY_NOTE_PLACEHOLDER.to_string());
        }
    }

    for website in &source.websites {
        item.websites.push(Website {
            url: website.url.clone(),
            label: website
                .label
                .clone()
                .filter(|label| !label.is_empty())
                .or_else(|| Some(DEFAULT_WEBSITE_LABEL.to_string())),
            autofill_behavior: website
                .autofill_behavior
                .clone()
                .filter(|behavior| !behavior.is_empty())
                .or_else(|| Some(DEFAULT_AUTOFILL_BEHAVIOR.to_string())),
        });
    }

    Transcoded { item, warnings }
}

/// Payment-card field roles detected from field id and title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardRole {
    Network,
    Number,
    Expiry,
    Verification,
    Pin,
}

fn detect_card_role(field: &Field) -> Option<CardRole> {
    let haystack = format!("{} {}", field.id.as_deref().unwrap_or(""), field.title)
        .to_ascii_lowercase();
    if haystack.contains("type") {
        Some(CardRole::Network)
    } else if haystack.contains("number") || haystack.contains("ccnum") {
        Some(CardRole::Number)
    } else if haystack.contains("expiry") || haystack.contains("expiration") {
        Some(CardRole::Expiry)
    } else if haystack.contains("verification") {
        Some(CardRole::Verification)
    } else if haystack.contains("pin") {
        Some(CardRole::Pin)
    } else {
        None
    }
}

fn transcode_field(field: &Field, card_item: bool, warnings: &mut Vec<String>) -> Field {
    // Field ids are never carried over; the destination regenerates them.
    // Section ids are, because field-to-section references depend on them.
    let mut out = Field {
        id: None,
        title: field.title.clone(),
        field_type: field.field_type.clone(),
        value: field.value.clone(),
        section_id: field.section_id.clone(),
        details: None,
    };

    let card_role = if card_item { detect_card_role(field) } else { None };

    if let Some(role) = card_role {
        match role {
            CardRole::Network => {
                out.field_type = FieldType::CreditCardType;
                out.value = Some(normalize_card_network(
                    field.value.as_deref().unwrap_or(""),
                    &field.title,
                    warnings,
                ));
            }
            CardRole::Number => out.field_type = FieldType::CreditCardNumber,
            CardRole::Expiry => {
                out.field_type = FieldType::MonthYear;
                out.value = Some(normalize_expiry(
                    field.value.as_deref().unwrap_or(""),
                    &field.title,
                    warnings,
                ));
            }
            CardRole::Verification | CardRole::Pin => out.field_type = FieldType::Concealed,
        }
        return out;
    }

    match &field.field_type {
        FieldType::Address => {
            // Every sub-field present, missing ones as empty strings;
            // omitting a key fails destination validation.
            let details = field
                .details
                .clone()
                .and_then(|value| serde_json::from_value::<AddressDetails>(value).ok())
                .unwrap_or_default();
            out.details = serde_json::to_value(&details).ok();
        }
        FieldType::KeyPair => {
            let details = field
                .details
                .clone()
                .and_then(|value| serde_json::from_value::<KeyPairDetails>(value).ok())
                .filter(|details| {
                    details.private_key.is_some()
                        || details.public_key.is_some()
                        || details.fingerprint.is_some()
                });
            match details {
                Some(details) => out.details = serde_json::to_value(&details).ok(),
                None => {
                    out.field_type = FieldType::Concealed;
                    warnings.push(format!(
                        "key field '{}' has no key-pair details; flattened to a concealed value",
                        field.title
                    ));
                }
            }
        }
        FieldType::Otp => {
            let value = field.value.as_deref().unwrap_or("");
            if !value.starts_with("otpauth://") && !is_base32_seed(value) {
                out.field_type = FieldType::Text;
                warnings.push(format!(
                    "one-time password on field '{}' is neither an otpauth:// URI nor a base-32 seed; downgraded to text",
                    field.title
                ));
            }
        }
        FieldType::Other(raw) => {
            out.field_type = FieldType::Text;
            warnings.push(format!(
                "unsupported field type '{}' on field '{}'; downgraded to text",
                raw, field.title
            ));
        }
        _ => {}
    }

    // Loose text has no fixed slot on the destination; it needs a section.
    if out.section_id.is_none() && out.field_type == FieldType::Text {
        out.section_id = Some(CATCH_ALL_SECTION.to_string());
    }

    out
}

/// Base-32 seed: 16 to 32 chars from the RFC 4648 alphabet, either case.
fn is_base32_seed(value: &str) -> bool {
    (16..=32).contains(&value.len())
        && value
            .chars()
            .all(|c| matches!(c.to_ascii_uppercase(), 'A'..='Z' | '2'..='7'))
}

fn normalize_card_network(raw: &str, field_title: &str, warnings: &mut Vec<String>) -> String {
    let network = match raw.trim().to_ascii_lowercase().as_str() {
        "mc" | "mastercard" => "Mastercard",
        "visa" => "Visa",
        "amex" | "american express" => "American Express",
        "discover" => "Discover",
        _ => "Unknown",
    };
    if network == "Unknown" && !raw.trim().is_empty() {
        warnings.push(format!(
            "unrecognized card network '{}' on field '{}'; set to Unknown",
            raw, field_title
        ));
    }
    network.to_string()
}

fn normalize_expiry(raw: &str, field_title: &str, warnings: &mut Vec<String>) -> String {
    match parse_expiry(raw.trim()) {
        Some(normalized) => normalized,
        None => {
            warnings.push(format!(
                "expiry '{}' on field '{}' is unparseable; defaulted to {}",
                raw, field_title, EXPIRY_SENTINEL
            ));
            EXPIRY_SENTINEL.to_string()
        }
    }
}

/// Accepted forms: `MM/YYYY` (idempotent), `MM-YYYY`, `MM/YY`, `MMYY`.
/// Single-digit months are zero-padded; the month must be 01 to 12.
fn parse_expiry(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let (month_part, year_part) = if let Some((month, year)) = raw.split_once(['/', '-']) {
        (month.trim(), year.trim())
    } else if raw.len() == 4 && raw.chars().all(|c| c.is_ascii_digit()) {
        (&raw[..2], &raw[2..])
    } else {
        return None;
    };

    if month_part.is_empty() || month_part.len() > 2 {
        return None;
    }
    let month: u32 = month_part.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }

    let year = match year_part.len() {
        4 => year_part.parse::<u32>().ok()?,
        2 => 2000 + year_part.parse::<u32>().ok()?,
        _ => return None,
    };

    Some(format!("{:02}/{}", month, year))
}

/// Every section id referenced by a field or file must exist in
/// `sections`; referenced-but-missing ones are synthesized. Source section
/// ids are preserved exactly.
fn ensure_referenced_sections(item: &mut Item) {
    let mut referenced: Vec<String> = Vec::new();
    for section_id in item
        .fields
        .iter()
        .filter_map(|field| field.section_id.as_deref())
        .chain(item.files.iter().filter_map(|file| file.section_id.as_deref()))
    {
        if !referenced.iter().any(|id| id == section_id) {
            referenced.push(section_id.to_string());
        }
    }

    for id in referenced {
        if !item.sections.iter().any(|section| section.id == id) {
            let title = if id == CATCH_ALL_SECTION {
                Some(CATCH_ALL_SECTION.to_string())
            } else {
                None
            };
            item.sections.push(Section { id, title });
        }
    }
}

fn synthesized_file_field_id(name: &str, index: usize) -> String {
    let slug: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{}-{}", slug, Utc::now().timestamp_millis(), index)
}
