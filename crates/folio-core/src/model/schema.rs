//! Static schema descriptions for the seven entities
//!
//! The query engine is schema-driven: filters, orderings, includes and
//! writes are validated against these tables and compiled into SQL from
//! them. API names are the camelCase names used in records and queries;
//! columns are the snake_case names in the relational store.

/// Scalar storage type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Int,
    Bool,
    /// UTC timestamp, millisecond precision
    DateTime,
    Json,
}

impl FieldType {
    /// Human-readable name used in validation messages
    pub fn describe(&self) -> &'static str {
        match self {
            FieldType::Text => "string",
            FieldType::Int => "integer",
            FieldType::Bool => "boolean",
            FieldType::DateTime => "RFC 3339 timestamp",
            FieldType::Json => "JSON value",
        }
    }

    /// Whether `_avg` / `_sum` apply
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int)
    }

    /// Whether the field participates in ordering, comparisons and `_min`/`_max`
    pub fn is_comparable(&self) -> bool {
        !matches!(self, FieldType::Json)
    }
}

/// Value filled in when a create payload omits the field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    None,
    /// Fresh UUIDv7 string
    Uuid,
    /// Current timestamp
    Now,
    Text(&'static str),
    Bool(bool),
}

/// Declaration of one scalar field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDef {
    pub name: &'static str,
    pub column: &'static str,
    pub ty: FieldType,
    pub nullable: bool,
    pub unique: bool,
    pub primary: bool,
    pub default: FieldDefault,
    /// Refreshed on every update (`updatedAt`)
    pub touch_on_update: bool,
}

impl FieldDef {
    pub const fn new(name: &'static str, column: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            column,
            ty,
            nullable: false,
            unique: false,
            primary: false,
            default: FieldDefault::None,
            touch_on_update: false,
        }
    }

    pub const fn text(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::Text)
    }

    pub const fn int(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::Int)
    }

    pub const fn boolean(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::Bool)
    }

    pub const fn datetime(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::DateTime)
    }

    pub const fn json(name: &'static str, column: &'static str) -> Self {
        Self::new(name, column, FieldType::Json)
    }

    /// String primary key generated when omitted
    pub const fn id() -> Self {
        Self {
            primary: true,
            unique: true,
            default: FieldDefault::Uuid,
            ..Self::text("id", "id")
        }
    }

    pub const fn created_at() -> Self {
        Self {
            default: FieldDefault::Now,
            ..Self::datetime("createdAt", "created_at")
        }
    }

    pub const fn updated_at() -> Self {
        Self {
            default: FieldDefault::Now,
            touch_on_update: true,
            ..Self::datetime("updatedAt", "updated_at")
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn unique(self) -> Self {
        Self {
            unique: true,
            ..self
        }
    }

    pub const fn default_to(self, default: FieldDefault) -> Self {
        Self { default, ..self }
    }

    /// Whether a create payload must supply this field
    pub fn is_required(&self) -> bool {
        !self.nullable && matches!(self.default, FieldDefault::None)
    }
}

/// What happens to a child row when the row it belongs to is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    Restrict,
    SetNull,
    /// Decided by the store's configured user-delete policy
    UserPolicy,
}

/// Shape of a relation between two entities
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelationKind {
    /// This entity holds the foreign key `field`
    BelongsTo {
        field: &'static str,
        on_delete: OnDelete,
    },
    /// The target entity holds a foreign key `foreign_field` pointing here
    HasMany { foreign_field: &'static str },
    /// Linked through a join table of (`self_column`, `target_column`) ids
    ManyToMany {
        join_table: &'static str,
        self_column: &'static str,
        target_column: &'static str,
    },
}

/// Declaration of one relation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelationDef {
    pub name: &'static str,
    pub target: &'static str,
    pub kind: RelationKind,
}

impl RelationDef {
    pub const fn belongs_to(
        name: &'static str,
        target: &'static str,
        field: &'static str,
        on_delete: OnDelete,
    ) -> Self {
        Self {
            name,
            target,
            kind: RelationKind::BelongsTo { field, on_delete },
        }
    }

    pub const fn has_many(
        name: &'static str,
        target: &'static str,
        foreign_field: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            kind: RelationKind::HasMany { foreign_field },
        }
    }

    pub const fn many_to_many(
        name: &'static str,
        target: &'static str,
        join_table: &'static str,
        self_column: &'static str,
        target_column: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            kind: RelationKind::ManyToMany {
                join_table,
                self_column,
                target_column,
            },
        }
    }

    /// To-many relations support `some`/`every`/`none`, nested pagination and `_count`
    pub fn is_to_many(&self) -> bool {
        !matches!(self.kind, RelationKind::BelongsTo { .. })
    }

    /// Schema of the related entity
    pub fn target_schema(&self) -> &'static EntitySchema {
        // Targets are declared alongside the schemas below; a miss is a typo
        // in this module, not a runtime condition.
        entity(self.target).unwrap_or_else(|| panic!("undeclared relation target {}", self.target))
    }
}

/// Complete description of one entity
#[derive(Debug, PartialEq)]
pub struct EntitySchema {
    pub name: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
    /// Pairs of nullable fields that must not both be set
    pub exclusive: &'static [(&'static str, &'static str)],
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn primary(&self) -> &'static FieldDef {
        // Every declared schema starts with `FieldDef::id()`
        &self.fields[0]
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// The belongs-to relation backed by foreign key `field`, if any
    pub fn relation_for_fk(&self, field: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| {
            matches!(r.kind, RelationKind::BelongsTo { field: fk, .. } if fk == field)
        })
    }
}

// ========== Entity schemas ==========

pub static USER: EntitySchema = EntitySchema {
    name: "User",
    table: "users",
    fields: &[
        FieldDef::id(),
        FieldDef::text("name", "name"),
        FieldDef::text("email", "email").unique(),
        FieldDef::text("password", "password"),
        FieldDef::text("role", "role").default_to(FieldDefault::Text("user")),
        FieldDef::text("image", "image").nullable(),
        FieldDef::created_at(),
        FieldDef::updated_at(),
    ],
    relations: &[
        RelationDef::has_many("posts", "Post", "authorId"),
        RelationDef::has_many("projects", "Project", "authorId"),
    ],
    exclusive: &[],
};

pub static POST: EntitySchema = EntitySchema {
    name: "Post",
    table: "posts",
    fields: &[
        FieldDef::id(),
        FieldDef::text("title", "title"),
        FieldDef::text("slug", "slug").unique(),
        FieldDef::text("excerpt", "excerpt"),
        FieldDef::text("content", "content"),
        FieldDef::text("coverImage", "cover_image").nullable(),
        FieldDef::text("template", "template").nullable(),
        FieldDef::text("accentColor", "accent_color").nullable(),
        FieldDef::boolean("featured", "featured").default_to(FieldDefault::Bool(false)),
        FieldDef::boolean("published", "published").default_to(FieldDefault::Bool(false)),
        FieldDef::datetime("publishedAt", "published_at").nullable(),
        FieldDef::text("category", "category").nullable(),
        FieldDef::int("readTime", "read_time").nullable(),
        FieldDef::text("metaTitle", "meta_title").nullable(),
        FieldDef::text("metaDescription", "meta_description").nullable(),
        FieldDef::created_at(),
        FieldDef::updated_at(),
        FieldDef::text("authorId", "author_id"),
    ],
    relations: &[
        RelationDef::belongs_to("author", "User", "authorId", OnDelete::UserPolicy),
        RelationDef::many_to_many("tags", "Tag", "post_tags", "post_id", "tag_id"),
        RelationDef::has_many("contentSections", "ContentSection", "postId"),
    ],
    exclusive: &[],
};

pub static PROJECT: EntitySchema = EntitySchema {
    name: "Project",
    table: "projects",
    fields: &[
        FieldDef::id(),
        FieldDef::text("title", "title"),
        FieldDef::text("slug", "slug").unique(),
        FieldDef::text("description", "description"),
        FieldDef::text("content", "content"),
        FieldDef::text("coverImage", "cover_image").nullable(),
        FieldDef::text("template", "template").nullable(),
        FieldDef::text("accentColor", "accent_color").nullable(),
        FieldDef::boolean("featured", "featured").default_to(FieldDefault::Bool(false)),
        FieldDef::boolean("published", "published").default_to(FieldDefault::Bool(false)),
        FieldDef::text("category", "category").nullable(),
        FieldDef::text("demoUrl", "demo_url").nullable(),
        FieldDef::text("repoUrl", "repo_url").nullable(),
        FieldDef::datetime("completedDate", "completed_date").nullable(),
        FieldDef::text("metaTitle", "meta_title").nullable(),
        FieldDef::text("metaDescription", "meta_description").nullable(),
        FieldDef::created_at(),
        FieldDef::updated_at(),
        FieldDef::text("authorId", "author_id"),
    ],
    relations: &[
        RelationDef::belongs_to("author", "User", "authorId", OnDelete::UserPolicy),
        RelationDef::many_to_many("tags", "Tag", "project_tags", "project_id", "tag_id"),
        RelationDef::has_many("contentSections", "ContentSection", "projectId"),
        RelationDef::has_many("galleryImages", "GalleryImage", "projectId"),
    ],
    exclusive: &[],
};

pub static TAG: EntitySchema = EntitySchema {
    name: "Tag",
    table: "tags",
    fields: &[
        FieldDef::id(),
        FieldDef::text("name", "name").unique(),
        FieldDef::created_at(),
        FieldDef::updated_at(),
    ],
    relations: &[
        RelationDef::many_to_many("posts", "Post", "post_tags", "tag_id", "post_id"),
        RelationDef::many_to_many("projects", "Project", "project_tags", "tag_id", "project_id"),
    ],
    exclusive: &[],
};

pub static GALLERY_IMAGE: EntitySchema = EntitySchema {
    name: "GalleryImage",
    table: "gallery_images",
    fields: &[
        FieldDef::id(),
        FieldDef::text("url", "url"),
        FieldDef::text("alt", "alt").nullable(),
        FieldDef::text("projectId", "project_id"),
        FieldDef::created_at(),
        FieldDef::updated_at(),
    ],
    relations: &[RelationDef::belongs_to(
        "project",
        "Project",
        "projectId",
        OnDelete::Cascade,
    )],
    exclusive: &[],
};

pub static CONTENT_SECTION: EntitySchema = EntitySchema {
    name: "ContentSection",
    table: "content_sections",
    fields: &[
        FieldDef::id(),
        FieldDef::text("type", "kind"),
        FieldDef::text("content", "content"),
        FieldDef::json("metadata", "metadata").nullable(),
        FieldDef::int("order", "sort_order"),
        FieldDef::text("postId", "post_id").nullable(),
        FieldDef::text("projectId", "project_id").nullable(),
        FieldDef::created_at(),
        FieldDef::updated_at(),
    ],
    relations: &[
        RelationDef::belongs_to("post", "Post", "postId", OnDelete::Cascade),
        RelationDef::belongs_to("project", "Project", "projectId", OnDelete::Cascade),
    ],
    exclusive: &[("postId", "projectId")],
};

pub static MEDIA: EntitySchema = EntitySchema {
    name: "Media",
    table: "media",
    fields: &[
        FieldDef::id(),
        FieldDef::text("name", "name"),
        FieldDef::text("url", "url"),
        FieldDef::text("type", "kind"),
        FieldDef::int("size", "size"),
        FieldDef::int("width", "width").nullable(),
        FieldDef::int("height", "height").nullable(),
        FieldDef::created_at(),
        FieldDef::updated_at(),
    ],
    relations: &[],
    exclusive: &[],
};

static ALL: [&EntitySchema; 7] = [
    &USER,
    &POST,
    &PROJECT,
    &TAG,
    &GALLERY_IMAGE,
    &CONTENT_SECTION,
    &MEDIA,
];

/// Look up a schema by entity name
pub fn entity(name: &str) -> Option<&'static EntitySchema> {
    ALL.iter().copied().find(|s| s.name == name)
}

/// All declared schemas
pub fn entities() -> &'static [&'static EntitySchema] {
    &ALL
}
