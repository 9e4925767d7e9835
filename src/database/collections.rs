//! Static metadata for every collection the API serves.
//!
//! API field names are camelCase; columns are snake_case. The filter layer
//! only ever emits SQL for columns declared here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Uuid,
    /// Uuid pointing at a record in the named collection
    Reference(&'static str),
    Timestamp,
    TextArray,
}

impl FieldType {
    /// Postgres type used when casting bound text parameters
    pub fn sql_cast(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "double precision",
            FieldType::Boolean => "boolean",
            FieldType::Uuid | FieldType::Reference(_) => "uuid",
            FieldType::Timestamp => "timestamptz",
            FieldType::TextArray => "text[]",
        }
    }

    /// Cast for a single element, which differs only for array columns
    pub fn element_cast(&self) -> &'static str {
        match self {
            FieldType::TextArray => "text",
            other => other.sql_cast(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::TextArray)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Uuid | FieldType::Reference(_) => "id",
            FieldType::Timestamp => "timestamp",
            FieldType::TextArray => "list of text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    Email,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub column: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub writable: bool,
    pub hidden: bool,
    pub enum_values: &'static [&'static str],
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub format: Option<FieldFormat>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, column: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            column,
            field_type,
            required: false,
            writable: true,
            hidden: false,
            enum_values: &[],
            min_len: None,
            max_len: None,
            min: None,
            max: None,
            format: None,
        }
    }

    pub const fn required(self) -> Self {
        Self { required: true, ..self }
    }

    pub const fn read_only(self) -> Self {
        Self { writable: false, ..self }
    }

    pub const fn hidden(self) -> Self {
        Self { hidden: true, ..self }
    }

    pub const fn one_of(self, values: &'static [&'static str]) -> Self {
        Self { enum_values: values, ..self }
    }

    pub const fn min_len(self, len: usize) -> Self {
        Self { min_len: Some(len), ..self }
    }

    pub const fn max_len(self, len: usize) -> Self {
        Self { max_len: Some(len), ..self }
    }

    pub const fn range(self, min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max, ..self }
    }

    pub const fn format(self, format: FieldFormat) -> Self {
        Self { format: Some(format), ..self }
    }
}

/// Route-level parent of a child collection, e.g. courses under a bootcamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentSpec {
    /// Field on the child holding the parent id
    pub field: &'static str,
    pub collection: &'static str,
    /// Only the parent's owner (or an admin) may create children
    pub owner_only: bool,
}

#[derive(Debug, PartialEq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub singular: &'static str,
    pub fields: &'static [FieldSpec],
    pub owner_field: Option<&'static str>,
    pub parent: Option<ParentSpec>,
}

impl CollectionSpec {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Fields returned to clients when no projection is requested
    pub fn visible_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| !f.hidden)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.iter().any(|f| f.column == column)
    }
}

const ID: FieldSpec = FieldSpec::new("id", "id", FieldType::Uuid).read_only();
const CREATED_AT: FieldSpec = FieldSpec::new("createdAt", "created_at", FieldType::Timestamp).read_only();
const OWNER: FieldSpec = FieldSpec::new("user", "user_id", FieldType::Reference("users")).read_only();

pub const ROLES: &[&str] = &["user", "publisher", "admin"];
pub const CAREERS: &[&str] = &[
    "Web Development",
    "Mobile Development",
    "UI/UX",
    "Data Science",
    "Business",
    "Other",
];
pub const SKILLS: &[&str] = &["beginner", "intermediate", "advanced"];

pub static USERS: CollectionSpec = CollectionSpec {
    name: "users",
    table: "users",
    singular: "User",
    fields: &[
        ID,
        FieldSpec::new("name", "name", FieldType::Text).required(),
        FieldSpec::new("email", "email", FieldType::Text).required().format(FieldFormat::Email),
        FieldSpec::new("role", "role", FieldType::Text).one_of(ROLES),
        FieldSpec::new("password", "password", FieldType::Text)
            .required()
            .hidden()
            .min_len(6)
            .max_len(128),
        CREATED_AT,
    ],
    owner_field: None,
    parent: None,
};

pub static BOOTCAMPS: CollectionSpec = CollectionSpec {
    name: "bootcamps",
    table: "bootcamps",
    singular: "Bootcamp",
    fields: &[
        ID,
        FieldSpec::new("name", "name", FieldType::Text).required().max_len(50),
        FieldSpec::new("slug", "slug", FieldType::Text).read_only(),
        FieldSpec::new("description", "description", FieldType::Text).required().max_len(500),
        FieldSpec::new("website", "website", FieldType::Text).format(FieldFormat::Url),
        FieldSpec::new("phone", "phone", FieldType::Text).max_len(20),
        FieldSpec::new("email", "email", FieldType::Text).format(FieldFormat::Email),
        FieldSpec::new("address", "address", FieldType::Text).required(),
        FieldSpec::new("careers", "careers", FieldType::TextArray).required().one_of(CAREERS),
        FieldSpec::new("averageCost", "average_cost", FieldType::Number).read_only(),
        FieldSpec::new("photo", "photo", FieldType::Text),
        FieldSpec::new("housing", "housing", FieldType::Boolean),
        FieldSpec::new("jobAssistance", "job_assistance", FieldType::Boolean),
        FieldSpec::new("jobGuarantee", "job_guarantee", FieldType::Boolean),
        FieldSpec::new("acceptGi", "accept_gi", FieldType::Boolean),
        OWNER,
        CREATED_AT,
    ],
    owner_field: Some("user"),
    parent: None,
};

pub static COURSES: CollectionSpec = CollectionSpec {
    name: "courses",
    table: "courses",
    singular: "Course",
    fields: &[
        ID,
        FieldSpec::new("title", "title", FieldType::Text).required(),
        FieldSpec::new("description", "description", FieldType::Text).required(),
        FieldSpec::new("weeks", "weeks", FieldType::Text).required(),
        FieldSpec::new("tuition", "tuition", FieldType::Number).required().range(Some(0.0), None),
        FieldSpec::new("minimumSkill", "minimum_skill", FieldType::Text).required().one_of(SKILLS),
        FieldSpec::new("scholarshipAvailable", "scholarship_available", FieldType::Boolean),
        FieldSpec::new("bootcamp", "bootcamp_id", FieldType::Reference("bootcamps")).read_only(),
        OWNER,
        CREATED_AT,
        FieldSpec::new("updatedAt", "updated_at", FieldType::Timestamp).read_only(),
    ],
    owner_field: Some("user"),
    parent: Some(ParentSpec { field: "bootcamp", collection: "bootcamps", owner_only: true }),
};

pub static REVIEWS: CollectionSpec = CollectionSpec {
    name: "reviews",
    table: "reviews",
    singular: "Review",
    fields: &[
        ID,
        FieldSpec::new("title", "title", FieldType::Text).required().max_len(100),
        FieldSpec::new("text", "text", FieldType::Text).required(),
        FieldSpec::new("rating", "rating", FieldType::Number)
            .required()
            .range(Some(1.0), Some(10.0)),
        FieldSpec::new("bootcamp", "bootcamp_id", FieldType::Reference("bootcamps")).read_only(),
        OWNER,
        CREATED_AT,
    ],
    owner_field: Some("user"),
    parent: Some(ParentSpec { field: "bootcamp", collection: "bootcamps", owner_only: false }),
};

pub static ALL: [&CollectionSpec; 4] = [&USERS, &BOOTCAMPS, &COURSES, &REVIEWS];

pub fn lookup(name: &str) -> Option<&'static CollectionSpec> {
    ALL.iter().copied().find(|c| c.name == name)
}
