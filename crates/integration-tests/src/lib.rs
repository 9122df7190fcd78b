//! End-to-end test harness for the Emporium storefront.
//!
//! Each [`TestApp`] serves the real router on an ephemeral port, backed by
//! in-memory stores and an in-memory session store. Tests talk to it over
//! HTTP with [`Browser`], a cookie-keeping `reqwest` client that does not
//! follow redirects.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p emporium-integration-tests
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::{Client, Response, StatusCode, header, multipart, redirect};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_sessions::MemoryStore;
use url::Url;

use emporium_core::Email;
use emporium_storefront::config::StorefrontConfig;
use emporium_storefront::db::{InMemoryDatabase, UserStore};
use emporium_storefront::models::User;
use emporium_storefront::routes;
use emporium_storefront::state::AppState;

/// Password used by [`Browser::signup_and_login`].
pub const DEFAULT_PASSWORD: &str = "secret1";

/// A running storefront.
pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<InMemoryDatabase>,
    pub upload_dir: PathBuf,
}

impl TestApp {
    /// Serve the storefront with auth rate limiting disabled.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Serve the storefront after adjusting its configuration.
    pub async fn spawn_with(configure: impl FnOnce(&mut StorefrontConfig)) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let upload_dir = std::env::temp_dir().join(format!("emporium-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");

        let mut config = StorefrontConfig {
            database_url: SecretString::from("postgres://unused"),
            host: addr.ip(),
            port: addr.port(),
            base_url: Url::parse(&format!("http://{addr}/")).expect("Invalid base URL"),
            upload_dir: upload_dir.clone(),
            static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../storefront/static"),
            rate_limit_auth: false,
            trust_proxy_headers: false,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
        };
        configure(&mut config);

        let store = Arc::new(InMemoryDatabase::new());
        let state = AppState::new(config, store.clone(), None);
        let app = routes::app(state, MemoryStore::default());

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test server failed");
        });

        Self {
            addr,
            store,
            upload_dir,
        }
    }

    /// A fresh browser with an empty cookie jar.
    pub fn browser(&self) -> Browser {
        Browser {
            client: Client::builder()
                .cookie_store(true)
                .redirect(redirect::Policy::none())
                .build()
                .expect("Failed to create HTTP client"),
            base: format!("http://{}", self.addr),
        }
    }

    /// Look up a user directly in the store.
    pub async fn user(&self, email: &str) -> User {
        let email = Email::parse(email).expect("Invalid email");
        self.store
            .find_user_by_email(&email)
            .await
            .expect("Store lookup failed")
            .expect("User not found")
    }

    /// Names of the files currently in the upload directory.
    pub fn uploaded_files(&self) -> Vec<String> {
        std::fs::read_dir(&self.upload_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

/// A product image upload.
pub struct Upload<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

impl Upload<'static> {
    /// A small PNG upload.
    pub const fn png() -> Self {
        Self {
            file_name: "photo.png",
            content_type: "image/png",
            bytes: b"\x89PNG\r\n\x1a\nnot really a png",
        }
    }
}

/// A cookie-keeping HTTP client pointed at one [`TestApp`].
pub struct Browser {
    client: Client,
    base: String,
}

impl Browser {
    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// GET a path.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// GET a path and return its status and body.
    pub async fn page(&self, path: &str) -> (StatusCode, String) {
        let response = self.get(path).await;
        let status = response.status();
        (status, response.text().await.expect("Failed to read body"))
    }

    /// The CSRF token of this browser's session, as rendered into forms.
    pub async fn csrf_token(&self) -> String {
        let (_, body) = self.page("/reset").await;
        extract_csrf(&body).expect("No CSRF token on the reset page")
    }

    /// POST an urlencoded form, adding the session's CSRF token.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Response {
        let token = self.csrf_token().await;
        let mut fields = fields.to_vec();
        fields.push(("_csrf", &token));
        self.post_form_raw(path, &fields).await
    }

    /// POST the login form claiming to come from `forwarded_for`.
    pub async fn login_forwarded_for(
        &self,
        email: &str,
        password: &str,
        forwarded_for: &str,
    ) -> Response {
        let token = self.csrf_token().await;
        self.client
            .post(self.url("/login"))
            .header("x-forwarded-for", forwarded_for)
            .form(&[("email", email), ("password", password), ("_csrf", &token)])
            .send()
            .await
            .expect("POST request failed")
    }

    /// POST an urlencoded form exactly as given.
    pub async fn post_form_raw(&self, path: &str, fields: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(fields)
            .send()
            .await
            .expect("POST request failed")
    }

    /// POST a multipart product form, passing the CSRF token in the query.
    pub async fn post_product(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        image: Option<Upload<'_>>,
    ) -> Response {
        self.post_product_images(path, fields, image.as_slice()).await
    }

    /// POST a multipart product form with any number of `image` parts.
    pub async fn post_product_images(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        images: &[Upload<'_>],
    ) -> Response {
        let token = self.csrf_token().await;
        let mut form = multipart::Form::new();
        for (name, value) in fields {
            form = form.text((*name).to_owned(), (*value).to_owned());
        }
        for image in images {
            let part = multipart::Part::bytes(image.bytes.to_vec())
                .file_name(image.file_name.to_owned())
                .mime_str(image.content_type)
                .expect("Invalid content type");
            form = form.part("image", part);
        }

        self.client
            .post(self.url(&format!("{path}?_csrf={token}")))
            .multipart(form)
            .send()
            .await
            .expect("Multipart POST failed")
    }

    /// DELETE a path with the CSRF token in a header.
    pub async fn delete(&self, path: &str) -> Response {
        let token = self.csrf_token().await;
        self.client
            .delete(self.url(path))
            .header("csrf-token", token)
            .send()
            .await
            .expect("DELETE request failed")
    }

    /// Submit the signup form.
    pub async fn signup(&self, email: &str, password: &str) -> Response {
        self.post_form(
            "/signup",
            &[
                ("email", email),
                ("password", password),
                ("confirmPassword", password),
            ],
        )
        .await
    }

    /// Submit the login form.
    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post_form("/login", &[("email", email), ("password", password)])
            .await
    }

    /// Create an account and log into it.
    pub async fn signup_and_login(&self, email: &str) {
        let response = self.signup(email, DEFAULT_PASSWORD).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "signup failed");
        let response = self.login(email, DEFAULT_PASSWORD).await;
        assert_eq!(location(&response), Some("/"), "login failed");
    }
}

/// The `Location` header of a redirect.
pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// The first CSRF token rendered into a page, from a hidden `_csrf` input or
/// a form action's `?_csrf=` query.
pub fn extract_csrf(html: &str) -> Option<String> {
    const INPUT: &str = "name=\"_csrf\" value=\"";
    const QUERY: &str = "?_csrf=";

    let start = html
        .find(INPUT)
        .map(|i| i + INPUT.len())
        .or_else(|| html.find(QUERY).map(|i| i + QUERY.len()))?;
    let rest = html.get(start..)?;
    let end = rest.find('"')?;
    rest.get(..end).map(str::to_owned).filter(|t| !t.is_empty())
}
