use std::sync::Arc;

use base64::engine::general_purpose;
use base64::Engine as _;
use chrono::NaiveDate;
use rand::Rng;

use crate::api::{
    BookDto, BookId, BookSummaryDto, GenreDto, Letter, Order, PageDto, ReferenceDataDto, Role,
    SeriesDto, SeriesId, SeriesSaveDto, SeriesSummaryDto,
};
use crate::book_specification::{BookPredicate, BookSpecification, InvalidSortField, SortField};
use crate::books_repository::{BookRepository, BookRepositoryError, PageRequest};
use crate::conversion::{
    book_to_book_dto, book_to_book_summary_dto, genre_to_genre_dto, letter_to_letter_dto,
    series_to_series_dto, series_to_series_summary_dto,
};
use crate::entity::{Book, BookLink, Creator, Person};

#[derive(thiserror::Error, Debug)]
pub enum BookServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Unable upload image with invalid base64 scheme: {0}")]
    ImageUploadFailure(#[source] base64::DecodeError),

    #[error("Repository failure {0}")]
    Repository(BookRepositoryError),
}

impl From<BookRepositoryError> for BookServiceError {
    fn from(err: BookRepositoryError) -> Self {
        match err {
            BookRepositoryError::BookNotFound(_)
            | BookRepositoryError::PersonNotFound(_)
            | BookRepositoryError::GenreNotFound(_)
            | BookRepositoryError::SeriesNotFound(_) => BookServiceError::NotFound(err.to_string()),
            other => BookServiceError::Repository(other),
        }
    }
}

impl From<InvalidSortField> for BookServiceError {
    fn from(err: InvalidSortField) -> Self {
        BookServiceError::InvalidArgument(err.to_string())
    }
}

/// Filters accepted by [`BookService::find_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub start_release_date: Option<NaiveDate>,
    pub end_release_date: Option<NaiveDate>,
    pub title_letter: Option<Letter>,
}

pub struct BookService {
    repository: Arc<dyn BookRepository>,
}

impl BookService {
    pub fn new(repository: Arc<dyn BookRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_by_id(&self, book_id: BookId) -> Result<BookDto, BookServiceError> {
        let book = self.repository.get_book(book_id).await?;
        Ok(book_to_book_dto(&book))
    }

    /// Returns None when the book exists but has no thumbnail
    pub async fn find_thumbnail(&self, book_id: BookId) -> Result<Option<Vec<u8>>, BookServiceError> {
        Ok(self.repository.get_thumbnail(book_id).await?)
    }

    /// Without any criteria returns a randomly chosen page of books.
    /// When only genre names are given and none of them is known, nothing matches.
    pub async fn search(
        &self,
        page: u32,
        size: u32,
        query: Option<String>,
        genre_names: Option<Vec<String>>,
    ) -> Result<Vec<BookSummaryDto>, BookServiceError> {
        validate_page_size(size)?;

        if query.is_none() && genre_names.is_none() {
            return self.random_page(size).await;
        }

        let mut specification = BookSpecification::default();

        if let Some(query) = query {
            specification = specification.and(BookPredicate::has_text(&query));
        }

        if let Some(genre_names) = genre_names {
            let genres = self.repository.find_genres_by_names(&genre_names).await?;
            if !genres.is_empty() {
                specification = specification.and(BookPredicate::has_genres(&genres));
            } else {
                tracing::debug!("None of genres {:?} is known", genre_names);
            }
        }

        // criteria were given but none of them could be applied
        if specification.is_unconstrained() {
            return Ok(vec![]);
        }

        let books = self
            .repository
            .find_books(&specification, PageRequest::new(page, size))
            .await?;
        to_summaries(&books.items)
    }

    async fn random_page(&self, size: u32) -> Result<Vec<BookSummaryDto>, BookServiceError> {
        let count = self.repository.count_books().await?;
        let total_pages = count.div_ceil(size as u64).max(1);
        let random_page = rand::thread_rng().gen_range(0..total_pages) as u32;
        tracing::debug!("Random page {} of {}", random_page, total_pages);

        let books = self
            .repository
            .find_books(
                &BookSpecification::default(),
                PageRequest::new(random_page, size),
            )
            .await?;
        to_summaries(&books.items)
    }

    pub async fn search_text(&self, query: &str) -> Result<Vec<BookSummaryDto>, BookServiceError> {
        let books = self.repository.search_text(query).await?;
        to_summaries(&books)
    }

    pub async fn find_all(
        &self,
        page: u32,
        size: u32,
        sort_field: &str,
        order: Order,
        filter: BookFilter,
    ) -> Result<PageDto<BookDto>, BookServiceError> {
        let sort_field: SortField = sort_field.parse()?;
        validate_page_size(size)?;

        let mut specification = BookSpecification::order_by(sort_field, order);

        if let Some(start) = filter.start_release_date {
            specification =
                specification.and(BookPredicate::release_date_greater_than_or_equal(start));
        }

        if let Some(end) = filter.end_release_date {
            specification = specification.and(BookPredicate::release_date_less_than_or_equal(end));
        }

        if let Some(letter) = filter.title_letter {
            specification = specification.and(BookPredicate::title_starts_with(letter));
        }

        let books = self
            .repository
            .find_books(&specification, PageRequest::new(page, size))
            .await?;

        Ok(PageDto {
            total_pages: books.total_pages(),
            items: books.items.iter().map(book_to_book_dto).collect(),
        })
    }

    /// Creates a new book or updates the existing one with the fields present in the dto
    pub async fn save(&self, book_dto: BookDto) -> Result<BookDto, BookServiceError> {
        let book = self.convert_book_dto_to_book(book_dto).await?;
        let saved = self.repository.save_book(book).await?;
        tracing::info!("Saved book {:?}", saved.id);
        Ok(book_to_book_dto(&saved))
    }

    async fn convert_book_dto_to_book(&self, book_dto: BookDto) -> Result<Book, BookServiceError> {
        let mut book = match book_dto.id {
            Some(book_id) => self.repository.get_book(book_id).await?,
            None => Book::default(),
        };

        if let Some(title) = book_dto.title {
            book.title = title;
        }

        if let Some(description) = book_dto.description {
            book.description = description;
        }

        if let Some(release_date) = book_dto.release_date {
            book.release_date = release_date;
        }

        if let Some(thumbnail) = book_dto.thumbnail {
            let bytes = general_purpose::STANDARD
                .decode(thumbnail)
                .map_err(BookServiceError::ImageUploadFailure)?;
            book.thumbnail = Some(bytes);
        }

        if let Some(creators) = book_dto.creators {
            let mut rebuilt = Vec::with_capacity(creators.len());
            for creator in creators {
                let person = match creator.id {
                    None => Person {
                        id: None,
                        full_name: creator.full_name,
                    },
                    Some(person_id) => self.repository.get_person(person_id).await?,
                };
                rebuilt.push(Creator {
                    book_id: book.id,
                    person,
                    role: creator.role,
                });
            }
            book.replace_creators(rebuilt);
        }

        if let Some(links) = book_dto.links {
            let book_id = book.id;
            book.replace_links(
                links
                    .into_iter()
                    .map(|link| BookLink {
                        book_id,
                        url: link.url,
                        description: link.description,
                    })
                    .collect(),
            );
        }

        if let Some(genres) = book_dto.genres {
            let mut rebuilt = Vec::with_capacity(genres.len());
            for genre_id in genres.iter().filter_map(|genre| genre.id) {
                rebuilt.push(self.repository.get_genre(genre_id).await?);
            }
            book.replace_genres(rebuilt);
        }

        if let Some(series_id) = book_dto.series_id {
            book.series = Some(self.repository.get_series(series_id).await?);
        }

        Ok(book)
    }

    pub async fn get_series(&self, series_id: SeriesId) -> Result<SeriesDto, BookServiceError> {
        let series = self.repository.get_series(series_id).await?;
        let books = self.repository.list_series_books(series_id).await?;
        Ok(series_to_series_dto(&series, &books))
    }

    /// Creates a series, or updates title and description of the existing one when id is given
    pub async fn save_series(&self, series_dto: SeriesSaveDto) -> Result<SeriesDto, BookServiceError> {
        let series = match series_dto.id {
            Some(series_id) => {
                let mut series = self.repository.get_series(series_id).await?;
                if let Some(title) = series_dto.title {
                    series.title = title;
                }
                if let Some(description) = series_dto.description {
                    series.description = description;
                }
                validate_not_blank("series title", &series.title)?;
                self.repository.update_series(&series).await?
            }
            None => {
                let title = series_dto.title.unwrap_or_default();
                validate_not_blank("series title", &title)?;
                self.repository
                    .add_series(&title, &series_dto.description.unwrap_or_default())
                    .await?
            }
        };
        tracing::info!("Saved series {}", series.id);
        self.get_series(series.id).await
    }

    pub async fn list_series(&self) -> Result<Vec<SeriesSummaryDto>, BookServiceError> {
        let series = self.repository.list_series().await?;
        Ok(series.iter().map(series_to_series_summary_dto).collect())
    }

    /// Adds a new genre, names are unique ignoring case
    pub async fn add_genre(&self, genre_dto: GenreDto) -> Result<GenreDto, BookServiceError> {
        if let Some(genre_id) = genre_dto.id {
            return Err(BookServiceError::InvalidArgument(format!(
                "genre {genre_id} already has an id, ids are assigned by the catalog"
            )));
        }
        let name = genre_dto.name.trim();
        validate_not_blank("genre name", name)?;

        let existing = self
            .repository
            .find_genres_by_names(&[name.to_string()])
            .await?;
        if let Some(genre) = existing.first() {
            return Err(BookServiceError::InvalidArgument(format!(
                "genre {} already exists",
                genre.name
            )));
        }

        let genre = self.repository.add_genre(name).await?;
        tracing::info!("Added genre {} with id {}", genre.name, genre.id);
        Ok(genre_to_genre_dto(&genre))
    }

    pub async fn reference_data(&self) -> Result<ReferenceDataDto, BookServiceError> {
        let genres = self.repository.list_genres().await?;
        Ok(ReferenceDataDto {
            roles: Role::ALL.to_vec(),
            genres: genres.iter().map(genre_to_genre_dto).collect(),
            letters: Letter::ALL.into_iter().map(letter_to_letter_dto).collect(),
        })
    }
}

fn to_summaries(books: &[Book]) -> Result<Vec<BookSummaryDto>, BookServiceError> {
    books
        .iter()
        .map(|book| {
            book_to_book_summary_dto(book).ok_or_else(|| {
                BookServiceError::Repository(BookRepositoryError::InvalidData(format!(
                    "book {:?} returned without id",
                    book.title
                )))
            })
        })
        .collect()
}

fn validate_not_blank(field: &str, value: &str) -> Result<(), BookServiceError> {
    if value.trim().is_empty() {
        return Err(BookServiceError::InvalidArgument(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

fn validate_page_size(size: u32) -> Result<(), BookServiceError> {
    if size == 0 {
        return Err(BookServiceError::InvalidArgument(
            "page size must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
