pub use in_memory_books_repository::InMemoryBookRepository;
pub use postgres_books_repository::{PostgresBooksRepository, PostgresBooksRepositoryConfig};

use crate::api::{BookId, GenreId, PersonId, SeriesId};
use crate::book_specification::BookSpecification;
use crate::entity::{Book, Genre, Person, Series};

mod in_memory_books_repository;
mod postgres_books_repository;

#[derive(thiserror::Error, Debug)]
pub enum BookRepositoryError {
    #[error("book with id {0} not found")]
    BookNotFound(BookId),

    #[error("person with id {0} not found")]
    PersonNotFound(PersonId),

    #[error("genre with id {0} not found")]
    GenreNotFound(GenreId),

    #[error("series with id {0} not found")]
    SeriesNotFound(SeriesId),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Invalid data in repository {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Zero based page index and page size
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_elements: u64,
    pub size: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(self.size as u64) as u32
    }
}

#[async_trait::async_trait]
pub trait BookRepository: Send + Sync {
    /// Retrieves book together with its creators, links, genres and series
    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError>;
    /// Retrieves only the thumbnail of the book
    async fn get_thumbnail(&self, book_id: BookId) -> Result<Option<Vec<u8>>, BookRepositoryError>;
    /// Number of all books in the repository
    async fn count_books(&self) -> Result<u64, BookRepositoryError>;
    /// Returns requested page of books matching the specification
    async fn find_books(
        &self,
        specification: &BookSpecification,
        page_request: PageRequest,
    ) -> Result<Page<Book>, BookRepositoryError>;
    /// Case insensitive substring search over title, description and creator names
    async fn search_text(&self, query: &str) -> Result<Vec<Book>, BookRepositoryError>;
    /// Persists the whole book graph, creating persons without id.
    /// Creators, links and genres stored for the book are replaced by the ones in the entity.
    async fn save_book(&self, book: Book) -> Result<Book, BookRepositoryError>;

    async fn get_person(&self, person_id: PersonId) -> Result<Person, BookRepositoryError>;

    async fn get_genre(&self, genre_id: GenreId) -> Result<Genre, BookRepositoryError>;
    /// Finds genres by name ignoring case, names that do not match anything are skipped
    async fn find_genres_by_names(&self, names: &[String]) -> Result<Vec<Genre>, BookRepositoryError>;
    /// Lists all genres ordered by name ignoring case
    async fn list_genres(&self) -> Result<Vec<Genre>, BookRepositoryError>;
    /// Adds genre and returns it with assigned id
    async fn add_genre(&self, name: &str) -> Result<Genre, BookRepositoryError>;

    async fn get_series(&self, series_id: SeriesId) -> Result<Series, BookRepositoryError>;
    /// Lists books of the series ordered by id
    async fn list_series_books(&self, series_id: SeriesId) -> Result<Vec<Book>, BookRepositoryError>;
    /// Adds series and returns it with assigned id
    async fn add_series(&self, title: &str, description: &str) -> Result<Series, BookRepositoryError>;
    /// Overwrites title and description of an existing series
    async fn update_series(&self, series: &Series) -> Result<Series, BookRepositoryError>;
    /// Lists all series ordered by title ignoring case
    async fn list_series(&self) -> Result<Vec<Series>, BookRepositoryError>;
}
