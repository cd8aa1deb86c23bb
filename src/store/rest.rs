use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{
    Comment, NewComment, NewPost, Post, PostId, PostPatch, PostQuery, RemoteStore, StoreError,
    StoreResult,
};

/// Asks PostgREST for a single JSON object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Posts with their comments embedded, comments in insertion order.
const POST_SELECT: &str = "*,comments(*)";

/// Hosted store speaking the PostgREST dialect (`/rest/v1/<table>`).
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base: Url,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl RestStore {
    pub fn new(project_url: &str, api_key: &str) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(api_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {api_key}"))?);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base: rest_base(project_url)?,
        })
    }

    fn table(&self, name: &str) -> StoreResult<Url> {
        Ok(self.base.join(name)?)
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or(text);
        Err(StoreError::Rejected { status, message })
    }

    async fn insert_one<T, B>(&self, table: &str, body: &B) -> StoreResult<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + Sync,
    {
        let request = self
            .client
            .post(self.table(table)?)
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }
}

fn header_value(value: &str) -> StoreResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| StoreError::Rejected {
        status: 0,
        message: format!("invalid API key header: {e}"),
    })
}

/// `https://xyz.supabase.co` -> `https://xyz.supabase.co/rest/v1/`
fn rest_base(project_url: &str) -> StoreResult<Url> {
    let trimmed = project_url.trim_end_matches('/');
    let base = if trimmed.ends_with("/rest/v1") {
        format!("{trimmed}/")
    } else {
        format!("{trimmed}/rest/v1/")
    };
    Ok(Url::parse(&base)?)
}

/// PostgREST `ilike` operand for a substring match. A plain column filter
/// takes its value verbatim, so the term is never quoted.
fn ilike_filter(term: &str) -> String {
    format!("ilike.*{term}*")
}

fn eq_filter(id: PostId) -> String {
    format!("eq.{}", id.0)
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select_posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>> {
        let mut url = self.table("posts")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", POST_SELECT);
            if !query.search.is_empty() {
                pairs.append_pair("title", &ilike_filter(&query.search));
            }
            pairs.append_pair("order", &format!("{}.desc", query.sort.column()));
            pairs.append_pair("comments.order", "id.asc");
        }

        let response = self.send(self.client.get(url)).await?;
        Ok(response.json().await?)
    }

    async fn select_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        let mut url = self.table("posts")?;
        url.query_pairs_mut()
            .append_pair("select", POST_SELECT)
            .append_pair("id", &eq_filter(id))
            .append_pair("comments.order", "id.asc");

        let request = self.client.get(url).header(ACCEPT, SINGLE_OBJECT);
        match self.send(request).await {
            Ok(response) => Ok(Some(response.json().await?)),
            // Zero rows under the single-object media type.
            Err(StoreError::Rejected { status, .. })
                if status == StatusCode::NOT_ACCEPTABLE.as_u16() =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn insert_post(&self, post: &NewPost) -> StoreResult<Post> {
        self.insert_one("posts", post).await
    }

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut url = self.table("posts")?;
        url.query_pairs_mut().append_pair("id", &eq_filter(id));
        let request = self
            .client
            .patch(url)
            .header("Prefer", "return=minimal")
            .json(patch);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<()> {
        let mut url = self.table("posts")?;
        url.query_pairs_mut().append_pair("id", &eq_filter(id));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn insert_comment(&self, comment: &NewComment) -> StoreResult<Comment> {
        self.insert_one("comments", comment).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_appends_rest_prefix() {
        assert_eq!(
            rest_base("https://abc.supabase.co").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/"
        );
        assert_eq!(
            rest_base("https://abc.supabase.co/").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/"
        );
        assert_eq!(
            rest_base("http://localhost:3001/rest/v1").unwrap().as_str(),
            "http://localhost:3001/rest/v1/"
        );
    }

    #[test]
    fn base_rejects_garbage() {
        assert!(matches!(rest_base("not a url"), Err(StoreError::Url(_))));
    }

    #[test]
    fn table_urls_join_under_base() {
        let store = RestStore::new("https://abc.supabase.co", "key").unwrap();
        assert_eq!(
            store.table("posts").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/posts"
        );
    }

    #[test]
    fn ilike_wraps_term_in_wildcards() {
        assert_eq!(ilike_filter("abc"), "ilike.*abc*");
    }

    #[test]
    fn ilike_sends_punctuation_verbatim() {
        assert_eq!(ilike_filter("St. Louis"), "ilike.*St. Louis*");
        assert_eq!(ilike_filter("Mom, Dad"), "ilike.*Mom, Dad*");
        assert_eq!(ilike_filter("(1998)"), "ilike.*(1998)*");
    }

    #[test]
    fn eq_filter_formats_id() {
        assert_eq!(eq_filter(PostId(12)), "eq.12");
    }

    #[test]
    fn api_key_with_newline_is_rejected() {
        assert!(RestStore::new("https://abc.supabase.co", "bad\nkey").is_err());
    }
}
