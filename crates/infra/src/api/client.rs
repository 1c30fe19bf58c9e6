use async_trait::async_trait;
use murmur_core::domain::comments::Comment;
use murmur_core::domain::identity::UserProfile;
use murmur_core::domain::notifications::Notification;
use murmur_core::domain::posts::{Post, PostEdit, Privacy};
use murmur_core::domain::reactions::ReactionKind;
use murmur_core::types::pagination::{Page, PageRequest};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::from_str;
use tracing::warn;

use crate::api::ApiError;
use crate::api::error::ErrorBody;
use crate::api::payload::{
    RawComment, RawLikeState, RawNotification, RawPage, RawPost, RawUser,
};
use crate::backend::{LikeState, NewComment, SocialBackend};

const USER_AGENT: &str = "murmur";

#[derive(Debug, Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl RestBackend {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        token: Option<String>,
    ) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url.trim()).map_err(|_| ApiError::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        let mut builder = self
            .http
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json");
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send_json<T>(&self, builder: RequestBuilder) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = check_status(builder.send().await?).await?;
        let body = response.text().await?;
        from_str(&body).map_err(|err| ApiError::InvalidResponse(format!("{err}: {body}")))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        check_status(builder.send().await?).await?;
        Ok(())
    }

    /// Like endpoints may answer with an empty body; then the requested state
    /// is taken as confirmed.
    async fn send_like(&self, builder: RequestBuilder, expected: bool) -> Result<LikeState, ApiError> {
        let response = check_status(builder.send().await?).await?;
        let body = response.text().await?;
        Ok(like_state_from_body(&body, expected))
    }

    fn paged(&self, segments: &[&str], request: PageRequest) -> Result<RequestBuilder, ApiError> {
        Ok(self
            .request(Method::GET, segments)?
            .query(&[("page", request.page), ("size", request.size)]))
    }
}

fn like_state_from_body(body: &str, expected: bool) -> LikeState {
    if body.trim().is_empty() {
        return RawLikeState::default().into_like_state(expected);
    }
    match from_str::<RawLikeState>(body) {
        Ok(raw) => raw.into_like_state(expected),
        Err(err) => {
            warn!(error = %err, body, "unreadable like response, keeping requested state");
            RawLikeState::default().into_like_state(expected)
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: ErrorBody = from_str(&body).unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_comment_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct UpdatePostBody<'a> {
    content: &'a str,
    privacy: Privacy,
}

#[derive(Debug, Serialize)]
struct ReactionBody {
    #[serde(rename = "type")]
    kind: ReactionKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfilesBatchBody<'a> {
    user_ids: &'a [String],
}

#[async_trait]
impl SocialBackend for RestBackend {
    async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let raw: RawUser = self.send_json(self.request(Method::GET, &["users", "me"])?).await?;
        raw.into_profile()
    }

    async fn list_feed(&self, request: PageRequest) -> Result<Page<Post>, ApiError> {
        let raw: RawPage<RawPost> = self.send_json(self.paged(&["posts"], request)?).await?;
        raw.into_page(request, RawPost::into_post)
    }

    async fn get_post(&self, post_id: &str) -> Result<Post, ApiError> {
        let raw: RawPost = self
            .send_json(self.request(Method::GET, &["posts", post_id])?)
            .await?;
        raw.into_post()
    }

    async fn update_post(&self, post_id: &str, edit: &PostEdit) -> Result<Post, ApiError> {
        let body = UpdatePostBody {
            content: &edit.content,
            privacy: edit.privacy,
        };
        let raw: RawPost = self
            .send_json(self.request(Method::PATCH, &["posts", post_id])?.json(&body))
            .await?;
        raw.into_post()
    }

    async fn delete_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.send_empty(self.request(Method::DELETE, &["posts", post_id])?)
            .await
    }

    async fn like_post(&self, post_id: &str) -> Result<LikeState, ApiError> {
        self.send_like(self.request(Method::POST, &["posts", post_id, "like"])?, true)
            .await
    }

    async fn unlike_post(&self, post_id: &str) -> Result<LikeState, ApiError> {
        self.send_like(self.request(Method::DELETE, &["posts", post_id, "like"])?, false)
            .await
    }

    async fn react_post(
        &self,
        post_id: &str,
        reaction: Option<ReactionKind>,
    ) -> Result<LikeState, ApiError> {
        let segments = ["posts", post_id, "reaction"];
        let mut state = match reaction {
            Some(kind) => {
                let builder = self
                    .request(Method::PUT, &segments)?
                    .json(&ReactionBody { kind });
                self.send_like(builder, true).await?
            }
            None => {
                self.send_like(self.request(Method::DELETE, &segments)?, false)
                    .await?
            }
        };
        if state.reaction.is_none() && state.liked {
            state.reaction = reaction;
        }
        Ok(state)
    }

    async fn save_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.send_empty(self.request(Method::POST, &["posts", post_id, "save"])?)
            .await
    }

    async fn unsave_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.send_empty(self.request(Method::DELETE, &["posts", post_id, "save"])?)
            .await
    }

    async fn list_comments(
        &self,
        post_id: &str,
        request: PageRequest,
    ) -> Result<Page<Comment>, ApiError> {
        let raw: RawPage<RawComment> = self
            .send_json(self.paged(&["posts", post_id, "comments"], request)?)
            .await?;
        raw.into_page(request, RawComment::into_comment)
    }

    async fn create_comment(
        &self,
        post_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, ApiError> {
        let body = CreateCommentBody {
            content: &comment.text,
            parent_comment_id: comment.parent_comment_id.as_deref(),
        };
        let raw: RawComment = self
            .send_json(
                self.request(Method::POST, &["posts", post_id, "comments"])?
                    .json(&body),
            )
            .await?;
        let mut created = raw.into_comment()?;
        if created.parent_comment_id.is_none() {
            created.parent_comment_id = comment.parent_comment_id.clone();
        }
        Ok(created)
    }

    async fn like_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        self.send_empty(self.request(Method::POST, &["comments", comment_id, "like"])?)
            .await
    }

    async fn unlike_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        self.send_empty(self.request(Method::DELETE, &["comments", comment_id, "like"])?)
            .await
    }

    async fn fetch_profiles_batch(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<UserProfile>, ApiError> {
        let raw: Vec<RawUser> = self
            .send_json(
                self.request(Method::POST, &["users", "batch"])?
                    .json(&ProfilesBatchBody { user_ids }),
            )
            .await?;
        raw.into_iter().map(RawUser::into_profile).collect()
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let raw: RawUser = self
            .send_json(self.request(Method::GET, &["users", user_id])?)
            .await?;
        raw.into_profile()
    }

    async fn list_notifications(
        &self,
        request: PageRequest,
    ) -> Result<Page<Notification>, ApiError> {
        let raw: RawPage<RawNotification> = self
            .send_json(self.paged(&["notifications"], request)?)
            .await?;
        raw.into_page(request, RawNotification::into_notification)
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ApiError> {
        self.send_empty(self.request(Method::POST, &["notifications", notification_id, "read"])?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::{RestBackend, like_state_from_body};

    fn backend(base: &str) -> RestBackend {
        RestBackend::new(reqwest::Client::new(), base, None).unwrap()
    }

    #[test]
    fn endpoint_joins_and_escapes_segments() {
        let api = backend("https://social.example/api/");
        let url = api.endpoint(&["posts", "a b/c", "like"]).unwrap();
        assert_eq!(url.as_str(), "https://social.example/api/posts/a%20b%2Fc/like");

        let api = backend("https://social.example/api");
        let url = api.endpoint(&["users", "me"]).unwrap();
        assert_eq!(url.as_str(), "https://social.example/api/users/me");
    }

    #[test]
    fn like_body_falls_back_to_requested_state() {
        let empty = like_state_from_body("  ", true);
        assert!(empty.liked);
        assert_eq!(empty.like_count, None);

        let garbled = like_state_from_body("<html>oops</html>", false);
        assert!(!garbled.liked);
        assert_eq!(garbled.like_count, None);

        let counted = like_state_from_body(r#"{"liked": true, "likesCount": 4}"#, false);
        assert!(counted.liked);
        assert_eq!(counted.like_count, Some(4));
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(RestBackend::new(reqwest::Client::new(), "not a url", None).is_err());
        assert!(RestBackend::new(reqwest::Client::new(), "mailto:me@example.com", None).is_err());
    }
}
