use indexmap::IndexMap;
use log::debug;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::models::{ClassResource, HttpMethod, Operation, PathItem};

/// Path templates to their operations, in first-seen order
pub type PathMap = IndexMap<String, PathItem>;

/// Joins a class path and an optional method path into one template with a
/// single leading `/` and no doubled separators.
pub fn join_path(class_path: &str, method_path: Option<&str>) -> String {
    let segments = class_path
        .split('/')
        .chain(method_path.unwrap_or_default().split('/'))
        .map(str::trim)
        .filter(|segment| !segment.is_empty());

    let mut joined = String::new();
    for segment in segments {
        joined.push('/');
        joined.push_str(segment);
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// Groups the operations of one class by their full path template. Class
/// tags and media types fill in whatever an operation leaves unset.
pub fn assemble_class(class: &ClassResource, diagnostics: &mut Diagnostics) -> PathMap {
    let mut paths = PathMap::new();

    for parsed in &class.operations {
        let template = join_path(&class.path, parsed.path.as_deref());
        let mut operation = parsed.operation.clone();
        if operation.tags.is_empty() {
            operation.tags = class.tags.clone();
        }
        if operation.produces.is_none() {
            operation.produces = class.produces.clone();
        }
        if operation.consumes.is_none() {
            operation.consumes = class.consumes.clone();
        }

        let location = format!("{}.{}", class.name, operation.operationId);
        insert_operation(&mut paths, template, parsed.method, operation, &location, diagnostics);
    }

    debug!("Class {} contributed {} path(s)", class.name, paths.len());
    paths
}

/// Folds `incoming` into `target`. Later operations replace earlier ones on
/// the same path and verb.
pub fn merge_paths(target: &mut PathMap, incoming: PathMap, diagnostics: &mut Diagnostics) {
    for (template, item) in incoming {
        for (method, operation) in item.operations {
            let location = operation.operationId.clone();
            insert_operation(target, template.clone(), method, operation, &location, diagnostics);
        }
    }
}

fn insert_operation(
    paths: &mut PathMap,
    template: String,
    method: HttpMethod,
    operation: Operation,
    location: &str,
    diagnostics: &mut Diagnostics,
) {
    let item = paths.entry(template.clone()).or_default();
    if let Some(replaced) = item.insert(method, operation) {
        diagnostics.warn(
            DiagnosticKind::VerbCollision,
            location,
            format!(
                "{} {} was already declared by '{}' and has been replaced",
                method, template, replaced.operationId
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParsedOperation;
    use pretty_assertions::assert_eq;

    fn op(id: &str) -> Operation {
        Operation {
            operationId: id.to_string(),
            ..Default::default()
        }
    }

    fn parsed(path: Option<&str>, method: HttpMethod, id: &str) -> ParsedOperation {
        ParsedOperation {
            path: path.map(str::to_string),
            method,
            operation: op(id),
        }
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/pet", Some("/{petId}")), "/pet/{petId}");
        assert_eq!(join_path("/pet/", Some("/{petId}")), "/pet/{petId}");
        assert_eq!(join_path("pet", Some("findByStatus")), "/pet/findByStatus");
        assert_eq!(join_path("/pet", None), "/pet");
        assert_eq!(join_path("", None), "/");
        assert_eq!(join_path("/", Some("/")), "/");
    }

    #[test]
    fn test_assemble_class_groups_and_inherits() {
        let mut tagged = op("addPet");
        tagged.tags = vec!["admin".to_string()];
        tagged.produces = Some(vec!["text/plain".to_string()]);

        let class = ClassResource {
            name: "PetResource".into(),
            path: "/pet".into(),
            tags: vec!["pet".into()],
            produces: Some(vec!["application/json".into()]),
            consumes: None,
            operations: vec![
                parsed(Some("/{petId}"), HttpMethod::Get, "getPetById"),
                ParsedOperation { path: None, method: HttpMethod::Post, operation: tagged },
                parsed(Some("/{petId}"), HttpMethod::Delete, "deletePet"),
            ],
        };

        let mut diagnostics = Diagnostics::new();
        let paths = assemble_class(&class, &mut diagnostics);

        assert_eq!(paths.keys().collect::<Vec<_>>(), vec!["/pet/{petId}", "/pet"]);
        let item = &paths["/pet/{petId}"];
        assert_eq!(item.len(), 2);
        let get = item.get(HttpMethod::Get).unwrap();
        assert_eq!(get.tags, vec!["pet"]);
        assert_eq!(get.produces, Some(vec!["application/json".to_string()]));
        assert_eq!(get.consumes, None);

        let post = paths["/pet"].get(HttpMethod::Post).unwrap();
        assert_eq!(post.tags, vec!["admin"]);
        assert_eq!(post.produces, Some(vec!["text/plain".to_string()]));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_collision_keeps_last_and_warns() {
        let class = ClassResource {
            name: "Dup".into(),
            path: "/x".into(),
            operations: vec![
                parsed(None, HttpMethod::Get, "first"),
                parsed(None, HttpMethod::Get, "second"),
            ],
            ..Default::default()
        };

        let mut diagnostics = Diagnostics::new();
        let paths = assemble_class(&class, &mut diagnostics);
        assert_eq!(paths["/x"].len(), 1);
        assert_eq!(paths["/x"].get(HttpMethod::Get).unwrap().operationId, "second");
        assert_eq!(diagnostics.count(DiagnosticKind::VerbCollision), 1);
    }

    #[test]
    fn test_merge_preserves_order_and_replaces() {
        let mut diagnostics = Diagnostics::new();
        let mut target = PathMap::new();
        let mut item = PathItem::default();
        item.insert(HttpMethod::Get, op("a"));
        target.insert("/a".into(), item);

        let mut incoming = PathMap::new();
        let mut b = PathItem::default();
        b.insert(HttpMethod::Get, op("b"));
        incoming.insert("/b".into(), b);
        let mut a2 = PathItem::default();
        a2.insert(HttpMethod::Get, op("a2"));
        a2.insert(HttpMethod::Put, op("a3"));
        incoming.insert("/a".into(), a2);

        merge_paths(&mut target, incoming, &mut diagnostics);

        assert_eq!(target.keys().collect::<Vec<_>>(), vec!["/a", "/b"]);
        assert_eq!(target["/a"].get(HttpMethod::Get).unwrap().operationId, "a2");
        assert_eq!(target["/a"].get(HttpMethod::Put).unwrap().operationId, "a3");
        assert_eq!(diagnostics.count(DiagnosticKind::VerbCollision), 1);
    }

    #[test]
    fn test_merging_same_class_twice_changes_nothing() {
        let class = ClassResource {
            name: "StoreResource".into(),
            path: "/store".into(),
            tags: vec!["store".into()],
            operations: vec![
                parsed(Some("/order"), HttpMethod::Post, "placeOrder"),
                parsed(Some("/order/{orderId}"), HttpMethod::Get, "getOrderById"),
                parsed(Some("/order/{orderId}"), HttpMethod::Delete, "deleteOrder"),
            ],
            ..Default::default()
        };
        let mut diagnostics = Diagnostics::new();
        let assembled = assemble_class(&class, &mut diagnostics);

        let mut single = PathMap::new();
        merge_paths(&mut single, assembled.clone(), &mut diagnostics);
        assert!(diagnostics.is_empty());

        let mut twice = PathMap::new();
        merge_paths(&mut twice, assembled.clone(), &mut diagnostics);
        merge_paths(&mut twice, assembled, &mut diagnostics);

        assert_eq!(twice, single);
        assert_eq!(diagnostics.count(DiagnosticKind::VerbCollision), 3);
    }
}
