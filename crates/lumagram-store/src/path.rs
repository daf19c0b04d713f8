//! Slash-path references to collections and documents.
//!
//! Collections and documents alternate along a path, so `posts` is a
//! collection, `posts/<id>` a document, `posts/<id>/comments` a collection
//! again.  Ids are supplied by [`DocumentStore::new_id`](crate::DocumentStore)
//! or the auth provider and must not be empty or contain `/`.

/// Reference to a collection, top-level or nested under a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef(String);

impl CollectionRef {
    /// A top-level collection.
    pub fn root(name: &str) -> Self {
        Self(name.to_owned())
    }

    /// The document with the given id inside this collection.
    pub fn doc(&self, id: &str) -> DocRef {
        DocRef(format!("{}/{id}", self.0))
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocRef(String);

impl DocRef {
    /// A subcollection under this document.
    pub fn collection(&self, name: &str) -> CollectionRef {
        CollectionRef(format!("{}/{name}", self.0))
    }

    /// The document id, i.e. the last path segment.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The collection holding this document.
    pub fn parent(&self) -> Option<CollectionRef> {
        self.0
            .rsplit_once('/')
            .map(|(head, _)| CollectionRef(head.to_owned()))
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_alternate_collection_and_document() {
        let posts = CollectionRef::root("posts");
        let post = posts.doc("p1");
        let comments = post.collection("comments");
        let comment = comments.doc("c9");

        assert_eq!(post.path(), "posts/p1");
        assert_eq!(comments.path(), "posts/p1/comments");
        assert_eq!(comment.path(), "posts/p1/comments/c9");
    }

    #[test]
    fn test_doc_id_is_last_segment() {
        let doc = CollectionRef::root("posts").doc("p1").collection("comments").doc("c9");
        assert_eq!(doc.id(), "c9");
    }

    #[test]
    fn test_parent_returns_owning_collection() {
        let posts = CollectionRef::root("posts");
        let doc = posts.doc("p1");
        assert_eq!(doc.parent(), Some(posts));
    }
}
