use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use folio_db::{StoreError, TableEntity, TableRecord};
use serde::{Deserialize, Serialize};

pub const MAX_NAME_CHARS: usize = 256;
pub const MAX_DESCRIPTION_CHARS: usize = 4096;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A stored book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub partition: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published_date: Option<NaiveDate>,
    #[serde(with = "rfc3339_micros")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "rfc3339_micros")]
    pub updated_at: DateTime<Utc>,
}

/// Request body for create and replace. Every field is optional on the wire;
/// [`BookInput::validate`] decides what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
}

/// Validated book fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BookFields {
    pub title: String,
    pub author: String,
    pub description: String,
    pub published_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: String,
}

impl FieldError {
    fn new(field: &'static str, error: impl Into<String>) -> Self {
        Self {
            field,
            error: error.into(),
        }
    }
}

impl BookInput {
    /// Trim and check every field, reporting all problems at once.
    pub fn validate(&self) -> Result<BookFields, Vec<FieldError>> {
        let mut errors = Vec::new();

        let title = required_name("title", self.title.as_deref(), &mut errors);
        let author = required_name("author", self.author.as_deref(), &mut errors);

        let description = self.description.as_deref().unwrap_or("").trim().to_string();
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            errors.push(FieldError::new(
                "description",
                format!("must be at most {} characters", MAX_DESCRIPTION_CHARS),
            ));
        }

        let published_date = match self.published_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push(FieldError::new("published_date", "must be a date in YYYY-MM-DD format"));
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(BookFields {
            title,
            author,
            description,
            published_date,
        })
    }
}

fn required_name(field: &'static str, value: Option<&str>, errors: &mut Vec<FieldError>) -> String {
    let value = value.map(str::trim).unwrap_or("");
    let chars = value.chars().count();
    if chars == 0 {
        errors.push(FieldError::new(field, "required"));
    } else if chars > MAX_NAME_CHARS {
        errors.push(FieldError::new(
            field,
            format!("must be at most {} characters", MAX_NAME_CHARS),
        ));
    }
    value.to_string()
}

impl TableRecord for Book {
    fn row_key(&self) -> &str {
        &self.id
    }

    fn to_entity(&self, partition: &str) -> TableEntity {
        let mut entity = TableEntity::new(partition, &self.id)
            .with_property("title", self.title.clone())
            .with_property("author", self.author.clone())
            .with_property("description", self.description.clone())
            .with_property("created_at", format_timestamp(&self.created_at))
            .with_property("updated_at", format_timestamp(&self.updated_at));
        if let Some(date) = self.published_date {
            entity = entity.with_property("published_date", date.format(DATE_FORMAT).to_string());
        }
        entity
    }

    fn from_entity(entity: TableEntity) -> Result<Self, StoreError> {
        let entity = entity.strip_system_properties();
        let row_key = entity.row_key.as_str();

        let timestamp = |name: &str| -> Result<DateTime<Utc>, StoreError> {
            let raw = entity.require_str(name)?;
            parse_timestamp(raw)
                .ok_or_else(|| StoreError::malformed(row_key, format!("'{}' is not RFC 3339", name)))
        };
        let created_at = timestamp("created_at")?;
        let updated_at = timestamp("updated_at")?;

        let published_date = match entity.get_str("published_date").filter(|s| !s.is_empty()) {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
                StoreError::malformed(row_key, "'published_date' is not YYYY-MM-DD")
            })?),
            None => None,
        };

        Ok(Self {
            title: entity.require_str("title")?.to_string(),
            author: entity.require_str("author")?.to_string(),
            description: entity.get_str("description").unwrap_or_default().to_string(),
            published_date,
            created_at,
            updated_at,
            id: entity.row_key.clone(),
            partition: entity.partition_key.clone(),
        })
    }
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

mod rfc3339_micros {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub book: Book,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookListResponse {
    pub success: bool,
    pub count: usize,
    pub books: Vec<Book>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub id: String,
}
