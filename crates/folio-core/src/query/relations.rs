//! Relation loading (`include`) and field projection (`select`)

use std::collections::BTreeMap;

use super::filter::Filter;
use super::order::OrderBy;

/// Arguments applied to a related collection when it is loaded
///
/// `filter`, `order_by`, `skip` and `take` only apply to to-many relations;
/// pagination is per parent record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationArgs {
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub include: Option<Include>,
}

impl RelationArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn include(mut self, include: Include) -> Self {
        self.include = Some(include);
        self
    }

    /// True when no collection arguments are set
    pub fn is_plain(&self) -> bool {
        self.filter.is_none() && self.order_by.is_empty() && self.skip.is_none() && self.take.is_none()
    }
}

/// Eager-loading request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Include {
    pub relations: BTreeMap<String, RelationArgs>,
    /// To-many relations whose sizes are reported under `_count`
    pub count: Vec<String>,
}

impl Include {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `relation` with no extra arguments (`relation: true`)
    pub fn with(mut self, relation: impl Into<String>) -> Self {
        self.relations.insert(relation.into(), RelationArgs::default());
        self
    }

    /// Load `relation` with nested arguments
    pub fn with_args(mut self, relation: impl Into<String>, args: RelationArgs) -> Self {
        self.relations.insert(relation.into(), args);
        self
    }

    /// Report the size of a to-many relation
    pub fn count(mut self, relation: impl Into<String>) -> Self {
        self.count.push(relation.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty() && self.count.is_empty()
    }
}

/// A selected relation inside a `Select`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationSelect {
    pub args: RelationArgs,
    /// `None` returns every scalar field of the related records
    pub select: Option<Select>,
}

/// Field projection request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub fields: Vec<String>,
    pub relations: BTreeMap<String, RelationSelect>,
    pub count: Vec<String>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the given scalar fields
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Select a relation, narrowed by `select`
    pub fn relation(mut self, relation: impl Into<String>, select: Select) -> Self {
        self.relations.insert(
            relation.into(),
            RelationSelect {
                args: RelationArgs::default(),
                select: Some(select),
            },
        );
        self
    }

    /// Select a relation with collection arguments
    pub fn relation_with(
        mut self,
        relation: impl Into<String>,
        args: RelationArgs,
        select: Option<Select>,
    ) -> Self {
        self.relations
            .insert(relation.into(), RelationSelect { args, select });
        self
    }

    pub fn count(mut self, relation: impl Into<String>) -> Self {
        self.count.push(relation.into());
        self
    }

    /// The include needed to load everything this projection touches
    pub fn to_include(&self) -> Include {
        let relations = self
            .relations
            .iter()
            .map(|(name, rel)| {
                let mut args = rel.args.clone();
                args.include = rel
                    .select
                    .as_ref()
                    .map(Select::to_include)
                    .filter(|inc| !inc.is_empty());
                (name.clone(), args)
            })
            .collect();
        Include {
            relations,
            count: self.count.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_builder() {
        let inc = Include::new()
            .with("author")
            .with_args("tags", RelationArgs::new().take(2))
            .count("contentSections");
        assert_eq!(inc.relations.len(), 2);
        assert_eq!(inc.relations["tags"].take, Some(2));
        assert_eq!(inc.count, vec!["contentSections".to_string()]);
    }

    #[test]
    fn test_select_to_include_nests() {
        let select = Select::fields(["title"])
            .relation("author", Select::fields(["email"]))
            .relation(
                "tags",
                Select::fields(["name"]).relation("posts", Select::fields(["slug"])),
            );
        let inc = select.to_include();
        assert!(inc.relations["author"].include.is_none());
        let tags_inc = inc.relations["tags"].include.as_ref().unwrap();
        assert!(tags_inc.relations.contains_key("posts"));
    }
}
