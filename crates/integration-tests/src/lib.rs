//! Integration tests for Shopfloor.
//!
//! Each test spawns the full admin router on an ephemeral port, backed by
//! the in-memory identity provider and document store, and drives it over
//! HTTP with a cookie-keeping `reqwest` client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfloor-integration-tests
//! ```

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use image::{ImageFormat, RgbImage};
use reqwest::{Client, Response, multipart, redirect};
use secrecy::SecretString;

use shopfloor_admin::backend::MemoryBackend;
use shopfloor_admin::config::{AdminConfig, BackendConfig, MemoryBackendConfig};
use shopfloor_admin::ingest::IngestPolicy;
use shopfloor_admin::routes::build_router;
use shopfloor_admin::state::AppState;
use shopfloor_core::{Email, PRODUCTS_COLLECTION};

/// Email of the seeded admin account.
pub const ADMIN_EMAIL: &str = "admin@tttfootwears.ng";

/// Password of the seeded admin account.
pub const ADMIN_PASSWORD: &str = "correct-horse-battery-staple";

/// Configuration for a dashboard served over plain HTTP on localhost.
///
/// # Panics
///
/// Panics if the seeded admin email does not parse.
#[must_use]
pub fn test_config() -> AdminConfig {
    AdminConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://localhost".to_string(),
        session_secret: SecretString::from("k8$Qz2!vLp9#Xr4@Tn7&Wm1^Yb6*Hc3%".to_string()),
        backend: BackendConfig::Memory(MemoryBackendConfig {
            admin_email: admin_email(),
            admin_password: SecretString::from(ADMIN_PASSWORD.to_string()),
        }),
        products_collection: PRODUCTS_COLLECTION.to_string(),
        ingest: IngestPolicy::default(),
        upload_body_limit: 10 * 1024 * 1024,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
        tls: None,
    }
}

/// The seeded admin email.
///
/// # Panics
///
/// Panics if the constant is not a valid email.
#[must_use]
pub fn admin_email() -> Email {
    Email::parse(ADMIN_EMAIL).expect("seeded admin email is valid")
}

/// Encode a solid-colour JPEG of the given size.
///
/// # Panics
///
/// Panics if encoding fails.
#[must_use]
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Jpeg)
        .expect("JPEG encoding succeeds");
    out.into_inner()
}

/// Encode an uncompressed BMP gradient of the given size.
///
/// BMP stores three bytes per pixel, so the file size is predictable.
///
/// # Panics
///
/// Panics if encoding fails.
#[must_use]
pub fn bmp(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| {
        let shade = u8::try_from(x % 256).unwrap_or(u8::MAX);
        image::Rgb([shade, 90, 160])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Bmp)
        .expect("BMP encoding succeeds");
    out.into_inner()
}

/// An image part for the upload form.
pub struct ImagePart {
    pub file_name: &'static str,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ImagePart {
    /// A JPEG of the given size named `shoe.jpg`.
    #[must_use]
    pub fn jpeg(width: u32, height: u32) -> Self {
        Self {
            file_name: "shoe.jpg",
            media_type: "image/jpeg",
            bytes: jpeg(width, height),
        }
    }

    /// A BMP of the given size named `shoe.bmp`.
    #[must_use]
    pub fn bmp(width: u32, height: u32) -> Self {
        Self {
            file_name: "shoe.bmp",
            media_type: "image/bmp",
            bytes: bmp(width, height),
        }
    }
}

/// A running dashboard and a client holding its session cookie.
pub struct TestApp {
    pub addr: SocketAddr,
    pub backend: MemoryBackend,
    pub client: Client,
}

impl TestApp {
    /// Serve a fresh dashboard on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound or the client cannot be built.
    pub async fn spawn() -> Self {
        let config = test_config();
        let backend =
            MemoryBackend::with_admin(admin_email(), SecretString::from(ADMIN_PASSWORD.to_string()));
        let state = AppState::new(config, Arc::new(backend.clone()), Arc::new(backend.clone()));
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            addr,
            backend,
            client,
        }
    }

    /// Absolute URL for a path on the test server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// GET a path.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request")
    }

    /// POST to a path with an empty body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post(&self, path: &str) -> Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("POST request")
    }

    /// Submit the login form.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn login_with(&self, email: &str, password: &str) -> Response {
        self.client
            .post(self.url("/auth/login"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .expect("login request")
    }

    /// Sign in as the seeded admin.
    ///
    /// # Panics
    ///
    /// Panics if sign-in does not redirect to the dashboard.
    pub async fn login(&self) {
        let resp = self.login_with(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert!(resp.status().is_redirection(), "login failed: {}", resp.status());
        assert_eq!(location(&resp), "/");
    }

    /// Submit the upload form.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn upload(
        &self,
        name: &str,
        price: &str,
        category: &str,
        image: Option<ImagePart>,
    ) -> Response {
        let mut form = multipart::Form::new()
            .text("name", name.to_string())
            .text("price", price.to_string())
            .text("category", category.to_string());
        if let Some(image) = image {
            let part = multipart::Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(image.media_type)
                .expect("valid media type");
            form = form.part("image", part);
        }

        self.client
            .post(self.url("/products"))
            .multipart(form)
            .send()
            .await
            .expect("upload request")
    }
}

/// The `Location` header of a redirect.
///
/// # Panics
///
/// Panics if the header is missing or not text.
#[must_use]
pub fn location(resp: &Response) -> String {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .expect("Location header")
        .to_str()
        .expect("Location is text")
        .to_string()
}
