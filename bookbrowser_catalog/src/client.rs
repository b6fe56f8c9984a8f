use anyhow::{bail, Context};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_tracing::TracingMiddleware;

use crate::api::{
    BookDto, BookId, BookSummaryDto, FindAllParams, GenreDto, PageDto, ReferenceDataDto,
    SearchParams, SeriesDto, SeriesId, SeriesSaveDto, SeriesSummaryDto, TextSearchParams,
};

pub struct BookBrowserCatalogClient {
    url: String,
    client: ClientWithMiddleware,
}

impl BookBrowserCatalogClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest_client)
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// Calls POST /api/book endpoint
    /// Returns the stored book, with ids assigned
    pub async fn save_book(&self, book: &BookDto) -> anyhow::Result<BookDto> {
        let response = self
            .client
            .post(format!("{}/api/book", self.url))
            .json(book)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to save book {}", error)
        }

        response.json().await.context("Failed to parse saved book")
    }

    /// Calls GET /api/book/{book_id} endpoint
    /// Returns None if the book does not exist
    pub async fn get_book(&self, book_id: BookId) -> anyhow::Result<Option<BookDto>> {
        let response = self
            .client
            .get(format!("{}/api/book/{}", self.url, book_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to get book {}", error)
        }

        Ok(Some(
            response.json().await.context("Failed to parse book")?,
        ))
    }

    /// Calls GET /api/book/{book_id}/thumbnail endpoint
    pub async fn get_thumbnail(&self, book_id: BookId) -> anyhow::Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get(format!("{}/api/book/{}/thumbnail", self.url, book_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            _ => {
                let error: String = response.json().await.unwrap_or_default();
                bail!("Failed to get thumbnail {}", error)
            }
        }
    }

    /// Calls GET /api/books endpoint
    pub async fn find_all(&self, params: &FindAllParams) -> anyhow::Result<PageDto<BookDto>> {
        let response = self
            .client
            .get(format!("{}/api/books", self.url))
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to list books {}", error)
        }

        response.json().await.context("Failed to parse books page")
    }

    /// Calls GET /api/books/search endpoint
    pub async fn search(&self, params: &SearchParams) -> anyhow::Result<Vec<BookSummaryDto>> {
        let response = self
            .client
            .get(format!("{}/api/books/search", self.url))
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to search books {}", error)
        }

        response.json().await.context("Failed to parse search result")
    }

    /// Calls GET /api/books/text-search endpoint
    pub async fn search_text(&self, query: &str) -> anyhow::Result<Vec<BookSummaryDto>> {
        let response = self
            .client
            .get(format!("{}/api/books/text-search", self.url))
            .query(&TextSearchParams {
                query: query.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to search books by text {}", error)
        }

        response.json().await.context("Failed to parse search result")
    }

    /// Calls GET /api/series/{series_id} endpoint
    pub async fn get_series(&self, series_id: SeriesId) -> anyhow::Result<Option<SeriesDto>> {
        let response = self
            .client
            .get(format!("{}/api/series/{}", self.url, series_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to get series {}", error)
        }

        Ok(Some(
            response.json().await.context("Failed to parse series")?,
        ))
    }

    /// Calls GET /api/series endpoint
    pub async fn list_series(&self) -> anyhow::Result<Vec<SeriesSummaryDto>> {
        let response = self
            .client
            .get(format!("{}/api/series", self.url))
            .send()
            .await?;

        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to list series {}", error)
        }

        response.json().await.context("Failed to parse series list")
    }

    /// Calls POST /api/series endpoint
    /// Returns the stored series together with its books
    pub async fn save_series(&self, series: &SeriesSaveDto) -> anyhow::Result<SeriesDto> {
        let response = self
            .client
            .post(format!("{}/api/series", self.url))
            .json(series)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to save series {}", error)
        }

        response.json().await.context("Failed to parse saved series")
    }

    /// Calls POST /api/genre endpoint
    pub async fn add_genre(&self, name: &str) -> anyhow::Result<GenreDto> {
        let response = self
            .client
            .post(format!("{}/api/genre", self.url))
            .json(&GenreDto {
                id: None,
                name: name.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to add genre {}", error)
        }

        response.json().await.context("Failed to parse added genre")
    }

    pub async fn reference_data(&self) -> anyhow::Result<ReferenceDataDto> {
        let response = self
            .client
            .get(format!("{}/api/reference-data", self.url))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Failed to get reference data {}", response.status())
        }

        response
            .json()
            .await
            .context("Failed to parse reference data")
    }
}
