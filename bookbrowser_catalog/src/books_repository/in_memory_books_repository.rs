use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::NaiveDate;

use crate::api::{BookId, GenreId, PersonId, Role, SeriesId};
use crate::book_specification::{BookPredicate, BookSpecification};
use crate::books_repository::{BookRepository, BookRepositoryError, Page, PageRequest};
use crate::entity::{Book, BookLink, BookLinkKey, Creator, CreatorKey, Genre, Person, Series};

struct BookRow {
    title: String,
    description: String,
    release_date: Option<NaiveDate>,
    thumbnail: Option<Vec<u8>>,
    series_id: Option<SeriesId>,
}

/// Rows kept the same way as in the relational store, books are assembled on read
#[derive(Default)]
struct Tables {
    books: BTreeMap<BookId, BookRow>,
    persons: HashMap<PersonId, String>,
    genres: BTreeMap<GenreId, String>,
    series: BTreeMap<SeriesId, Series>,
    creators: Vec<(CreatorKey, Role)>,
    links: Vec<(BookLinkKey, String)>,
    book_genres: Vec<(BookId, GenreId)>,
}

impl Tables {
    fn assemble_book(&self, book_id: BookId, row: &BookRow) -> Book {
        Book {
            id: Some(book_id),
            title: row.title.clone(),
            description: row.description.clone(),
            release_date: row.release_date,
            thumbnail: row.thumbnail.clone(),
            creators: self
                .creators
                .iter()
                .filter(|(key, _)| key.book_id == book_id)
                .map(|(key, role)| Creator {
                    book_id: Some(book_id),
                    person: Person {
                        id: Some(key.person_id),
                        full_name: self.persons.get(&key.person_id).cloned().unwrap_or_default(),
                    },
                    role: *role,
                })
                .collect(),
            links: self
                .links
                .iter()
                .filter(|(key, _)| key.book_id == book_id)
                .map(|(key, description)| BookLink {
                    book_id: Some(book_id),
                    url: key.url.clone(),
                    description: description.clone(),
                })
                .collect(),
            genres: self
                .book_genres
                .iter()
                .filter(|(id, _)| *id == book_id)
                .filter_map(|(_, genre_id)| {
                    self.genres.get(genre_id).map(|name| Genre {
                        id: *genre_id,
                        name: name.clone(),
                    })
                })
                .collect(),
            series: row
                .series_id
                .and_then(|series_id| self.series.get(&series_id).cloned()),
        }
    }

    fn all_books(&self) -> impl Iterator<Item = Book> + '_ {
        self.books
            .iter()
            .map(|(book_id, row)| self.assemble_book(*book_id, row))
    }

    /// Checks every reference of the book before anything gets written
    fn validate_references(&self, book: &Book) -> Result<(), BookRepositoryError> {
        if let Some(book_id) = book.id {
            if !self.books.contains_key(&book_id) {
                return Err(BookRepositoryError::BookNotFound(book_id));
            }
        }
        if let Some(series) = &book.series {
            if !self.series.contains_key(&series.id) {
                return Err(BookRepositoryError::SeriesNotFound(series.id));
            }
        }
        for person_id in book.creators.iter().filter_map(|creator| creator.person.id) {
            if !self.persons.contains_key(&person_id) {
                return Err(BookRepositoryError::PersonNotFound(person_id));
            }
        }
        for genre in book.genres.iter() {
            if !self.genres.contains_key(&genre.id) {
                return Err(BookRepositoryError::GenreNotFound(genre.id));
            }
        }
        Ok(())
    }
}

pub struct InMemoryBookRepository {
    book_sequence_generator: AtomicI64,
    person_sequence_generator: AtomicI64,
    genre_sequence_generator: AtomicI64,
    series_sequence_generator: AtomicI64,
    tables: parking_lot::RwLock<Tables>,
}

impl Default for InMemoryBookRepository {
    fn default() -> Self {
        Self {
            book_sequence_generator: AtomicI64::new(1),
            person_sequence_generator: AtomicI64::new(1),
            genre_sequence_generator: AtomicI64::new(1),
            series_sequence_generator: AtomicI64::new(1),
            tables: Default::default(),
        }
    }
}

#[async_trait::async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError> {
        let tables = self.tables.read();
        tables
            .books
            .get(&book_id)
            .map(|row| tables.assemble_book(book_id, row))
            .ok_or(BookRepositoryError::BookNotFound(book_id))
    }

    async fn get_thumbnail(&self, book_id: BookId) -> Result<Option<Vec<u8>>, BookRepositoryError> {
        self.tables
            .read()
            .books
            .get(&book_id)
            .map(|row| row.thumbnail.clone())
            .ok_or(BookRepositoryError::BookNotFound(book_id))
    }

    async fn count_books(&self) -> Result<u64, BookRepositoryError> {
        Ok(self.tables.read().books.len() as u64)
    }

    async fn find_books(
        &self,
        specification: &BookSpecification,
        page_request: PageRequest,
    ) -> Result<Page<Book>, BookRepositoryError> {
        let mut matching: Vec<Book> = self
            .tables
            .read()
            .all_books()
            .filter(|book| specification.matches(book))
            .collect();
        matching.sort_by(|a, b| specification.compare(a, b));

        let total_elements = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page_request.offset() as usize)
            .take(page_request.size as usize)
            .collect();

        Ok(Page {
            items,
            total_elements,
            size: page_request.size,
        })
    }

    async fn search_text(&self, query: &str) -> Result<Vec<Book>, BookRepositoryError> {
        let predicate = BookPredicate::has_text(query);
        Ok(self
            .tables
            .read()
            .all_books()
            .filter(|book| predicate.matches(book))
            .collect())
    }

    async fn save_book(&self, mut book: Book) -> Result<Book, BookRepositoryError> {
        let mut tables = self.tables.write();
        tables.validate_references(&book)?;

        let book_id = match book.id {
            Some(book_id) => book_id,
            None => self.book_sequence_generator.fetch_add(1, Ordering::Relaxed),
        };
        book.id = Some(book_id);

        tables.books.insert(
            book_id,
            BookRow {
                title: book.title.clone(),
                description: book.description.clone(),
                release_date: book.release_date,
                thumbnail: book.thumbnail.clone(),
                series_id: book.series.as_ref().map(|series| series.id),
            },
        );

        tables.creators.retain(|(key, _)| key.book_id != book_id);
        for creator in book.creators.iter_mut() {
            let person_id = match creator.person.id {
                Some(person_id) => person_id,
                None => {
                    let person_id = self.person_sequence_generator.fetch_add(1, Ordering::Relaxed);
                    tables
                        .persons
                        .insert(person_id, creator.person.full_name.clone());
                    person_id
                }
            };
            creator.book_id = Some(book_id);
            creator.person.id = Some(person_id);
            let key = CreatorKey { book_id, person_id };
            match tables.creators.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, role)) => *role = creator.role,
                None => tables.creators.push((key, creator.role)),
            }
        }

        tables.links.retain(|(key, _)| key.book_id != book_id);
        for link in book.links.iter() {
            let key = BookLinkKey {
                book_id,
                url: link.url.clone(),
            };
            match tables.links.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, description)) => *description = link.description.clone(),
                None => tables.links.push((key, link.description.clone())),
            }
        }

        tables.book_genres.retain(|(id, _)| *id != book_id);
        for genre in book.genres.iter() {
            if !tables.book_genres.contains(&(book_id, genre.id)) {
                tables.book_genres.push((book_id, genre.id));
            }
        }

        let row = tables
            .books
            .get(&book_id)
            .ok_or(BookRepositoryError::BookNotFound(book_id))?;
        Ok(tables.assemble_book(book_id, row))
    }

    async fn get_person(&self, person_id: PersonId) -> Result<Person, BookRepositoryError> {
        self.tables
            .read()
            .persons
            .get(&person_id)
            .map(|full_name| Person {
                id: Some(person_id),
                full_name: full_name.clone(),
            })
            .ok_or(BookRepositoryError::PersonNotFound(person_id))
    }

    async fn get_genre(&self, genre_id: GenreId) -> Result<Genre, BookRepositoryError> {
        self.tables
            .read()
            .genres
            .get(&genre_id)
            .map(|name| Genre {
                id: genre_id,
                name: name.clone(),
            })
            .ok_or(BookRepositoryError::GenreNotFound(genre_id))
    }

    async fn find_genres_by_names(&self, names: &[String]) -> Result<Vec<Genre>, BookRepositoryError> {
        let names: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
        Ok(self
            .tables
            .read()
            .genres
            .iter()
            .filter(|(_, name)| names.contains(&name.to_lowercase()))
            .map(|(id, name)| Genre {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn list_genres(&self) -> Result<Vec<Genre>, BookRepositoryError> {
        let mut genres: Vec<Genre> = self
            .tables
            .read()
            .genres
            .iter()
            .map(|(id, name)| Genre {
                id: *id,
                name: name.clone(),
            })
            .collect();
        genres.sort_by_cached_key(|genre| (genre.name.to_lowercase(), genre.id));
        Ok(genres)
    }

    async fn add_genre(&self, name: &str) -> Result<Genre, BookRepositoryError> {
        let id = self.genre_sequence_generator.fetch_add(1, Ordering::Relaxed);
        self.tables.write().genres.insert(id, name.to_string());
        Ok(Genre {
            id,
            name: name.to_string(),
        })
    }

    async fn get_series(&self, series_id: SeriesId) -> Result<Series, BookRepositoryError> {
        self.tables
            .read()
            .series
            .get(&series_id)
            .cloned()
            .ok_or(BookRepositoryError::SeriesNotFound(series_id))
    }

    async fn list_series_books(&self, series_id: SeriesId) -> Result<Vec<Book>, BookRepositoryError> {
        let tables = self.tables.read();
        if !tables.series.contains_key(&series_id) {
            return Err(BookRepositoryError::SeriesNotFound(series_id));
        }
        Ok(tables
            .books
            .iter()
            .filter(|(_, row)| row.series_id == Some(series_id))
            .map(|(book_id, row)| tables.assemble_book(*book_id, row))
            .collect())
    }

    async fn add_series(&self, title: &str, description: &str) -> Result<Series, BookRepositoryError> {
        let series = Series {
            id: self.series_sequence_generator.fetch_add(1, Ordering::Relaxed),
            title: title.to_string(),
            description: description.to_string(),
        };
        self.tables.write().series.insert(series.id, series.clone());
        Ok(series)
    }

    async fn update_series(&self, series: &Series) -> Result<Series, BookRepositoryError> {
        let mut tables = self.tables.write();
        let stored = tables
            .series
            .get_mut(&series.id)
            .ok_or(BookRepositoryError::SeriesNotFound(series.id))?;
        *stored = series.clone();
        Ok(stored.clone())
    }

    async fn list_series(&self) -> Result<Vec<Series>, BookRepositoryError> {
        let mut series: Vec<Series> = self.tables.read().series.values().cloned().collect();
        series.sort_by_cached_key(|series| (series.title.to_lowercase(), series.id));
        Ok(series)
    }
}
