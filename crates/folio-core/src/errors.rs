use thiserror::Error;

/// Result type alias using the canonical error facility
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by the data-access layer is classified by one of
/// these kinds. Each kind maps to a stable error code that callers (HTTP
/// handlers, jobs) can match on without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    /// A unique lookup, single-record update/delete or nested connect missed
    NotFound,
    /// A unique or foreign-key constraint was violated
    Conflict,
    /// The caller-supplied query or payload is structurally invalid
    Validation,
    /// The store cannot be reached, or no pooled connection is available
    StoreUnavailable,
    /// A transaction exceeded its configured timeout
    Timeout,
    /// The store configuration is unusable
    Configuration,

    // Integration/IO
    Persistence,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Conflict => "ERR_CONFLICT",
            ExErrorKind::Validation => "ERR_VALIDATION",
            ExErrorKind::StoreUnavailable => "ERR_STORE_UNAVAILABLE",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries the classification plus optional context: the repository
/// operation, the entity it ran against, the record id and the fields
/// involved (e.g. the unique column behind a Conflict).
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    record_id: Option<String>,
    fields: Vec<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            record_id: None,
            fields: Vec::new(),
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity name context (`User`, `Post`, ...)
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add record id context
    pub fn with_record_id(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }

    /// Add a single offending field
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Replace the offending fields
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity context, if any
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// Get the record id context, if any
    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    /// Fields involved in the failure (empty when unknown)
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Fill in operation and entity context when the error does not carry it yet
    pub fn in_context(mut self, op: &str, entity: &str) -> Self {
        if self.op.is_none() {
            self.op = Some(op.to_string());
        }
        if self.entity.is_none() {
            self.entity = Some(entity.to_string());
        }
        self
    }

    /// Shorthand for a NotFound error on `entity`
    pub fn not_found(entity: &str, message: impl Into<String>) -> Self {
        Self::new(ExErrorKind::NotFound)
            .with_entity(entity)
            .with_message(message)
    }

    /// Shorthand for a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ExErrorKind::Validation).with_message(message)
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " on {}", entity)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(id) = &self.record_id {
            write!(f, " (record_id: {})", id)?;
        }
        if !self.fields.is_empty() {
            write!(f, " (fields: {})", self.fields.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Boundary validation failures for caller-supplied queries and payloads
///
/// All of these are raised before the store is touched and convert into an
/// `ExError` of kind `Validation`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Field name not declared on the entity
    #[error("Unknown field '{field}' on {entity}")]
    UnknownField { entity: String, field: String },

    /// Relation name not declared on the entity
    #[error("Unknown relation '{relation}' on {entity}")]
    UnknownRelation { entity: String, relation: String },

    /// Operator is not applicable to the field's type
    #[error("Operator '{operator}' is not supported on {entity}.{field}")]
    UnsupportedOperator {
        entity: String,
        field: String,
        operator: String,
    },

    /// Value does not match the declared field type
    #[error("Invalid value for {entity}.{field}: expected {expected}")]
    InvalidValue {
        entity: String,
        field: String,
        expected: String,
    },

    /// Unique lookup on a field without a uniqueness guarantee
    #[error("Field '{field}' on {entity} is not unique")]
    NotUnique { entity: String, field: String },

    /// `select` and `include` given on the same call
    #[error("select and include cannot be combined on a single call")]
    SelectWithInclude,

    /// groupBy orderBy/having references a plain field outside `by`
    #[error("Field '{field}' used in groupBy {clause} must be listed in `by`")]
    GroupByFieldNotInBy { field: String, clause: String },

    /// groupBy requires at least one `by` field
    #[error("groupBy requires at least one field in `by`")]
    EmptyGroupBy,

    /// groupBy pagination without an ordering
    #[error("groupBy with take or skip requires an orderBy")]
    GroupByPaginationWithoutOrder,

    /// Numeric aggregate on a non-numeric field
    #[error("Aggregate '{aggregate}' requires a numeric field, {entity}.{field} is not")]
    NonNumericAggregate {
        entity: String,
        field: String,
        aggregate: String,
    },

    /// Required field missing from a create payload
    #[error("Missing required field {entity}.{field}")]
    MissingField { entity: String, field: String },

    /// Nested relation write where only scalar writes are allowed
    #[error("Nested write on '{relation}' is not allowed in {op}")]
    NestedWriteNotAllowed { relation: String, op: String },

    /// Nested write operation not applicable to the relation
    #[error("Nested '{action}' is not supported on {entity}.{relation}")]
    UnsupportedNestedWrite {
        entity: String,
        relation: String,
        action: String,
    },

    /// Two mutually exclusive owner fields are both set
    #[error("{entity} cannot reference both {first} and {second}")]
    ExclusiveFields {
        entity: String,
        first: String,
        second: String,
    },

    /// Relation argument that does not fit the relation's cardinality
    #[error("'{usage}' is not applicable to relation {entity}.{relation}")]
    RelationMisuse {
        entity: String,
        relation: String,
        usage: String,
    },

    /// Payload is not a JSON object
    #[error("Payload for {entity} must be an object")]
    MalformedPayload { entity: String },
}

impl QueryError {
    /// Field names this failure concerns
    pub fn fields(&self) -> Vec<String> {
        match self {
            QueryError::UnknownField { field, .. }
            | QueryError::UnsupportedOperator { field, .. }
            | QueryError::InvalidValue { field, .. }
            | QueryError::NotUnique { field, .. }
            | QueryError::GroupByFieldNotInBy { field, .. }
            | QueryError::NonNumericAggregate { field, .. }
            | QueryError::MissingField { field, .. } => vec![field.clone()],
            QueryError::UnknownRelation { relation, .. }
            | QueryError::NestedWriteNotAllowed { relation, .. }
            | QueryError::UnsupportedNestedWrite { relation, .. }
            | QueryError::RelationMisuse { relation, .. } => vec![relation.clone()],
            QueryError::ExclusiveFields { first, second, .. } => {
                vec![first.clone(), second.clone()]
            }
            QueryError::SelectWithInclude
            | QueryError::EmptyGroupBy
            | QueryError::GroupByPaginationWithoutOrder
            | QueryError::MalformedPayload { .. } => Vec::new(),
        }
    }
}

impl From<QueryError> for ExError {
    fn from(err: QueryError) -> Self {
        let entity = match &err {
            QueryError::UnknownField { entity, .. }
            | QueryError::UnknownRelation { entity, .. }
            | QueryError::UnsupportedOperator { entity, .. }
            | QueryError::InvalidValue { entity, .. }
            | QueryError::NotUnique { entity, .. }
            | QueryError::NonNumericAggregate { entity, .. }
            | QueryError::MissingField { entity, .. }
            | QueryError::UnsupportedNestedWrite { entity, .. }
            | QueryError::ExclusiveFields { entity, .. }
            | QueryError::RelationMisuse { entity, .. }
            | QueryError::MalformedPayload { entity } => Some(entity.clone()),
            _ => None,
        };

        let mut ex = ExError::new(ExErrorKind::Validation)
            .with_fields(err.fields())
            .with_message(err.to_string());
        if let Some(entity) = entity {
            ex = ex.with_entity(entity);
        }
        ex
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
    }
}
