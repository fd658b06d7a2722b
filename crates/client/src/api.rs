//! Typed HTTP client for the story and sign-in API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use sharerides_core::{ApiError, ApiResponse, Email, Story, StoryId, StoryInput, UserId};

use crate::error::ClientError;

/// One page of a story listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryPage {
    pub stories: Vec<Story>,
    /// Number of stories matching the filter, across all pages.
    pub total: u64,
}

/// Paging parameters; `None` lets the server pick its default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

/// The user signed in on this client's session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: Email,
}

#[derive(Deserialize)]
struct SessionBody {
    data: Option<SessionUser>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInBody<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
}

/// Story operations the state hooks depend on.
///
/// [`ApiClient`] is the real implementation; tests substitute their own.
#[async_trait]
pub trait StoriesApi: Send + Sync {
    async fn list_stories(
        &self,
        plate: Option<&str>,
        page: PageRequest,
    ) -> Result<StoryPage, ClientError>;

    async fn create_story(&self, input: &StoryInput) -> Result<Story, ClientError>;

    async fn update_story(&self, id: StoryId, input: &StoryInput) -> Result<Story, ClientError>;

    async fn delete_story(&self, id: StoryId) -> Result<(), ClientError>;

    async fn upvote_story(&self, id: StoryId) -> Result<Story, ClientError>;

    async fn my_stories(&self) -> Result<Vec<Story>, ClientError>;
}

/// HTTP client for a ShareRideStories server.
///
/// Keeps a cookie jar, so a client that has followed a sign-in link stays
/// signed in for later calls. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .cookie_store(true)
            // The sign-in callback answers with a redirect we want to see.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner { http, base_url }),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.inner.http.request(method, self.url(path)?))
    }

    /// Send and decode the JSON envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(server_error(status, &body));
        }

        match serde_json::from_str::<ApiResponse<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    body = %body.chars().take(200).collect::<String>(),
                    "Unexpected response body"
                );
                Err(e.into())
            }
        }
    }

    async fn send_data<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        self.send::<T>(request).await?.data.ok_or_else(missing_data)
    }

    /// Fetch one story.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` with status 404 if there is no such story.
    pub async fn get_story(&self, id: StoryId) -> Result<Story, ClientError> {
        self.send_data(self.request(Method::GET, &format!("api/stories/{id}"))?)
            .await
    }

    /// Ask the server to email a sign-in link.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is rejected or the email cannot be sent.
    pub async fn request_sign_in(
        &self,
        email: &str,
        callback_url: Option<&str>,
    ) -> Result<String, ClientError> {
        let request = self
            .request(Method::POST, "auth/signin")?
            .json(&SignInBody {
                email,
                callback_url,
            });
        Ok(self
            .send::<()>(request)
            .await?
            .message
            .unwrap_or_default())
    }

    /// Follow an emailed sign-in link, storing the session cookie.
    ///
    /// Returns the path the server redirected to.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` if the link is invalid, reused, or expired.
    pub async fn follow_sign_in_link(&self, link: &str) -> Result<String, ClientError> {
        let response = self.inner.http.get(Url::parse(link)?).send().await?;
        let status = response.status();

        if status.is_redirection() {
            return Ok(response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("/")
                .to_owned());
        }

        let body = response.text().await?;
        Err(server_error(status, &body))
    }

    /// The user signed in on this client, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub async fn session(&self) -> Result<Option<SessionUser>, ClientError> {
        let response = self.request(Method::GET, "auth/session")?.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(server_error(status, &body));
        }
        Ok(serde_json::from_str::<SessionBody>(&body)?.data)
    }

    /// End the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.send::<()>(self.request(Method::POST, "auth/signout")?)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StoriesApi for ApiClient {
    async fn list_stories(
        &self,
        plate: Option<&str>,
        page: PageRequest,
    ) -> Result<StoryPage, ClientError> {
        let mut url = self.url("api/stories")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(plate) = plate {
                query.append_pair("plate", plate);
            }
            if let Some(limit) = page.limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(skip) = page.skip {
                query.append_pair("skip", &skip.to_string());
            }
        }
        // Drop the dangling `?` when nothing was appended.
        if url.query() == Some("") {
            url.set_query(None);
        }

        let envelope = self
            .send::<Vec<Story>>(self.inner.http.get(url))
            .await?;
        let stories = envelope.data.ok_or_else(missing_data)?;
        Ok(StoryPage {
            total: envelope
                .total
                .unwrap_or_else(|| u64::try_from(stories.len()).unwrap_or(u64::MAX)),
            stories,
        })
    }

    async fn create_story(&self, input: &StoryInput) -> Result<Story, ClientError> {
        self.send_data(self.request(Method::POST, "api/stories")?.json(input))
            .await
    }

    async fn update_story(&self, id: StoryId, input: &StoryInput) -> Result<Story, ClientError> {
        self.send_data(
            self.request(Method::PUT, &format!("api/stories/{id}"))?
                .json(input),
        )
        .await
    }

    async fn delete_story(&self, id: StoryId) -> Result<(), ClientError> {
        self.send::<()>(self.request(Method::DELETE, &format!("api/stories/{id}"))?)
            .await?;
        Ok(())
    }

    async fn upvote_story(&self, id: StoryId) -> Result<Story, ClientError> {
        self.send_data(self.request(Method::PATCH, &format!("api/stories/{id}/upvote"))?)
            .await
    }

    async fn my_stories(&self) -> Result<Vec<Story>, ClientError> {
        self.send_data(self.request(Method::GET, "api/user/stories")?)
            .await
    }
}

/// Turn an error response into `ClientError::Api`, keeping the server's
/// message when the body is the error envelope.
fn server_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_owned()
        });
    ClientError::Api { status, message }
}

fn missing_data() -> ClientError {
    ClientError::Decode(serde::de::Error::missing_field("data"))
}
