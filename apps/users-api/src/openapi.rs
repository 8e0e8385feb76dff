use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "Users API",
        version = "0.1.0",
        description = "Directory of users: create, list, fetch, rename and delete"
    ),
    servers(
        (url = "/api", description = "API base path")
    ),
    nest(
        (path = "/v1/users", api = domain_users::ApiDoc)
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_paths_are_nested_under_v1() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();

        assert!(paths.iter().any(|p| p == "/v1/users"), "{:?}", paths);
        assert!(paths.iter().any(|p| p == "/v1/users/{id}"), "{:?}", paths);
    }
}
