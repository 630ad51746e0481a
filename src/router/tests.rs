//! Tests for route registration and resolution.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::parser::Method;
    use crate::router::{Error, Pattern, RouteTable, Segment};

    fn table(routes: &[(Method, &str, &'static str)]) -> RouteTable<&'static str> {
        let mut table = RouteTable::new();
        for (method, pattern, handler) in routes {
            table.register(*method, pattern, *handler).unwrap();
        }
        table
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_pattern_segments() {
        let pattern = Pattern::parse("/users/{id}/posts").unwrap();
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("users".to_string()),
                Segment::Param("id".to_string()),
                Segment::Literal("posts".to_string()),
            ]
        );
        assert_eq!(pattern.literal_count(), 2);
        assert_eq!(Pattern::parse("/").unwrap().depth(), 0);
        assert_eq!(Pattern::parse("/users/").unwrap().depth(), 2);
    }

    #[test]
    fn test_invalid_patterns() {
        for raw in ["", "users", "/users//posts", "//", "/{id", "/id}", "/{}", "/a{id}", "/{a-b}", "/{id}/{id}"] {
            let result = Pattern::parse(raw);
            assert!(
                matches!(result, Err(Error::InvalidPattern { ref pattern, .. }) if pattern == raw),
                "{raw:?} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_resolve_disjoint_routes() {
        let table = table(&[
            (Method::GET, "/", "index"),
            (Method::GET, "/users", "list_users"),
            (Method::GET, "/users/{id}", "get_user"),
            (Method::GET, "/users/{id}/posts/{post_id}", "get_post"),
            (Method::POST, "/users", "create_user"),
        ]);

        let root = table.resolve(Method::GET, "/").unwrap();
        assert_eq!(root.handler, "index");
        assert!(root.path_params.is_empty());

        assert_eq!(table.resolve(Method::POST, "/users").unwrap().handler, "create_user");

        let user = table.resolve(Method::GET, "/users/42").unwrap();
        assert_eq!(user.handler, "get_user");
        assert_eq!(user.path_params, params(&[("id", "42")]));
        assert_eq!(user.pattern, "/users/{id}");

        let post = table.resolve(Method::GET, "/users/42/posts/7").unwrap();
        assert_eq!(post.handler, "get_post");
        assert_eq!(post.path_params, params(&[("id", "42"), ("post_id", "7")]));
    }

    #[test]
    fn test_username_scenario() {
        let table = table(&[(Method::GET, "/{username}", "hello")]);
        let result = table.resolve(Method::GET, "/oleh").unwrap();
        assert_eq!(result.handler, "hello");
        assert_eq!(result.path_params, params(&[("username", "oleh")]));
    }

    #[test]
    fn test_duplicate_route_leaves_table_unchanged() {
        let mut table = table(&[(Method::GET, "/items/{id}", "first")]);

        let result = table.register(Method::GET, "/items/{id}", "second");
        assert_eq!(
            result,
            Err(Error::DuplicateRoute {
                method: Method::GET,
                pattern: "/items/{id}".to_string()
            })
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(Method::GET, "/items/1").unwrap().handler, "first");

        // Same pattern under another method is a different route.
        table.register(Method::DELETE, "/items/{id}", "delete").unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_not_found_vs_method_not_allowed() {
        let table = table(&[
            (Method::GET, "/items", "list"),
            (Method::PUT, "/items", "replace"),
        ]);

        assert_eq!(
            table.resolve(Method::GET, "/nothing"),
            Err(Error::NotFound("/nothing".to_string()))
        );
        assert_eq!(
            table.resolve(Method::POST, "/items"),
            Err(Error::MethodNotAllowed {
                method: Method::POST,
                path: "/items".to_string(),
                allowed: vec![Method::GET, Method::PUT],
            })
        );
    }

    #[test]
    fn test_literal_segments_are_case_sensitive() {
        let table = table(&[(Method::GET, "/About", "about")]);
        assert!(table.resolve(Method::GET, "/About").is_ok());
        assert!(matches!(table.resolve(Method::GET, "/about"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_variables_do_not_match_empty_segments() {
        let table = table(&[(Method::GET, "/users/{id}", "get_user")]);
        assert!(matches!(table.resolve(Method::GET, "/users/"), Err(Error::NotFound(_))));
        assert!(matches!(table.resolve(Method::GET, "/users"), Err(Error::NotFound(_))));
        assert!(matches!(table.resolve(Method::GET, "/users/1/extra"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_literal_wins_over_variable_regardless_of_order() {
        let variable_first = table(&[
            (Method::GET, "/users/{id}", "by_id"),
            (Method::GET, "/users/me", "me"),
        ]);
        let literal_first = table(&[
            (Method::GET, "/users/me", "me"),
            (Method::GET, "/users/{id}", "by_id"),
        ]);

        for table in [variable_first, literal_first] {
            assert_eq!(table.resolve(Method::GET, "/users/me").unwrap().handler, "me");
            assert_eq!(table.resolve(Method::GET, "/users/7").unwrap().handler, "by_id");
        }
    }

    #[test]
    fn test_leftmost_literal_decides() {
        let table = table(&[
            (Method::GET, "/{section}/b/c", "late_literals"),
            (Method::GET, "/a/{page}/{item}", "early_literal"),
        ]);
        assert_eq!(table.resolve(Method::GET, "/a/b/c").unwrap().handler, "early_literal");
        assert_eq!(table.resolve(Method::GET, "/x/b/c").unwrap().handler, "late_literals");
    }

    #[test]
    fn test_equal_specificity_uses_registration_order() {
        let table = table(&[
            (Method::GET, "/{first}", "first"),
            (Method::GET, "/{second}", "second"),
        ]);
        let result = table.resolve(Method::GET, "/x").unwrap();
        assert_eq!(result.handler, "first");
        assert_eq!(result.path_params, params(&[("first", "x")]));
    }

    #[test]
    fn test_method_match_preferred_over_more_specific_path() {
        let table = table(&[
            (Method::POST, "/users/me", "update_me"),
            (Method::GET, "/users/{id}", "by_id"),
        ]);
        assert_eq!(table.resolve(Method::GET, "/users/me").unwrap().handler, "by_id");
    }

    #[test]
    fn test_trailing_slash_is_distinct_by_default() {
        let mut table = table(&[(Method::GET, "/docs", "docs")]);
        assert!(matches!(table.resolve(Method::GET, "/docs/"), Err(Error::NotFound(_))));

        table.register(Method::GET, "/docs/", "docs_slash").unwrap();
        assert_eq!(table.resolve(Method::GET, "/docs/").unwrap().handler, "docs_slash");
        assert_eq!(table.resolve(Method::GET, "/docs").unwrap().handler, "docs");
    }

    #[test]
    fn test_trailing_slash_normalization() {
        let mut table = table(&[(Method::GET, "/docs", "docs")]);
        table.set_normalize_trailing_slash(true);
        assert_eq!(table.resolve(Method::GET, "/docs/").unwrap().handler, "docs");
        assert!(matches!(table.resolve(Method::GET, "/"), Err(Error::NotFound(_))));

        table.register(Method::GET, "/api/", "api").unwrap();
        assert_eq!(table.resolve(Method::GET, "/api").unwrap().handler, "api");
        assert!(matches!(
            table.register(Method::GET, "/api", "again"),
            Err(Error::DuplicateRoute { .. })
        ));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let table = table(&[(Method::GET, "/users/{id}", "get_user")]);
        let first = table.resolve(Method::GET, "/users/9");
        let second = table.resolve(Method::GET, "/users/9");
        assert_eq!(first, second);
    }

    #[test]
    fn test_routes_listing() {
        let table = table(&[
            (Method::GET, "/a/b", "ab"),
            (Method::GET, "/", "root"),
        ]);
        let listed: Vec<_> = table.routes().map(|route| route.pattern.as_str()).collect();
        assert_eq!(listed, vec!["/", "/a/b"]);
        assert!(!table.is_empty());
    }
}
