use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, GenericClient, NoTls, Row};

use crate::api::{BookId, GenreId, Order, PersonId, Role, SeriesId};
use crate::book_specification::{BookPredicate, BookSpecification};
use crate::books_repository::{BookRepository, BookRepositoryError, Page, PageRequest};
use crate::entity::{Book, BookLink, Creator, Genre, Person, Series};

type SqlParam = Box<dyn ToSql + Sync + Send>;

pub struct PostgresBooksRepository {
    client: Mutex<Client>,
}

pub struct PostgresBooksRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl PostgresBooksRepository {
    pub async fn init(config: PostgresBooksRepositoryConfig) -> anyhow::Result<Self> {
        let connection_str = format!(
            "postgresql://{}:{}@{}",
            config.username, config.password, config.hostname
        );
        tracing::info!("Postgres host: {}", config.hostname);
        let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
            .await
            .context("Failed to start postgres")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("connection error: {}", e);
            }
        });

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS series (
            id              BIGSERIAL PRIMARY KEY,
            title           TEXT NOT NULL,
            description     TEXT NOT NULL DEFAULT ''
            );
        CREATE TABLE IF NOT EXISTS books (
            id              BIGSERIAL PRIMARY KEY,
            title           TEXT NOT NULL,
            description     TEXT NOT NULL,
            release_date    DATE,
            thumbnail       BYTEA,
            series_id       BIGINT REFERENCES series (id)
            );
        CREATE TABLE IF NOT EXISTS persons (
            id              BIGSERIAL PRIMARY KEY,
            full_name       TEXT NOT NULL
            );
        CREATE TABLE IF NOT EXISTS genres (
            id              BIGSERIAL PRIMARY KEY,
            name            TEXT NOT NULL
            );
        CREATE TABLE IF NOT EXISTS creators (
            book_id         BIGINT NOT NULL REFERENCES books (id) ON DELETE CASCADE,
            person_id       BIGINT NOT NULL REFERENCES persons (id),
            role            TEXT NOT NULL,
            position        INTEGER NOT NULL,
            PRIMARY KEY (book_id, person_id)
            );
        CREATE TABLE IF NOT EXISTS book_links (
            book_id         BIGINT NOT NULL REFERENCES books (id) ON DELETE CASCADE,
            url             TEXT NOT NULL,
            description     TEXT NOT NULL,
            position        INTEGER NOT NULL,
            PRIMARY KEY (book_id, url)
            );
        CREATE TABLE IF NOT EXISTS book_genres (
            book_id         BIGINT NOT NULL REFERENCES books (id) ON DELETE CASCADE,
            genre_id        BIGINT NOT NULL REFERENCES genres (id),
            position        INTEGER NOT NULL,
            PRIMARY KEY (book_id, genre_id)
            );
        ",
            )
            .await
            .context("Failed to setup tables")?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

fn push_param(params: &mut Vec<SqlParam>, value: impl ToSql + Sync + Send + 'static) -> String {
    params.push(Box::new(value));
    format!("${}", params.len())
}

/// Wraps the query in `%` escaping wildcards typed by the user
fn contains_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn predicate_condition(predicate: &BookPredicate, params: &mut Vec<SqlParam>) -> String {
    match predicate {
        BookPredicate::HasText(query) => {
            let pattern = push_param(params, contains_pattern(query));
            format!(
                "(b.title ILIKE {pattern} OR b.description ILIKE {pattern} OR EXISTS (\
                 SELECT 1 FROM creators c JOIN persons pe ON pe.id = c.person_id \
                 WHERE c.book_id = b.id AND pe.full_name ILIKE {pattern}))"
            )
        }
        BookPredicate::HasGenres(genre_ids) => {
            let ids = push_param(params, genre_ids.clone());
            format!(
                "EXISTS (SELECT 1 FROM book_genres bg WHERE bg.book_id = b.id AND bg.genre_id = ANY({ids}))"
            )
        }
        BookPredicate::ReleaseDateGreaterThanOrEqual(date) => {
            format!("b.release_date >= {}", push_param(params, *date))
        }
        BookPredicate::ReleaseDateLessThanOrEqual(date) => {
            format!("b.release_date <= {}", push_param(params, *date))
        }
        BookPredicate::TitleStartsWith(letter) => match letter.as_char() {
            Some(first) => format!("upper(b.title) LIKE {}", push_param(params, format!("{first}%"))),
            None => "b.title ~ '^[^A-Za-z]'".to_string(),
        },
    }
}

fn where_clause(specification: &BookSpecification, params: &mut Vec<SqlParam>) -> String {
    let conditions: Vec<String> = specification
        .predicates()
        .iter()
        .map(|predicate| predicate_condition(predicate, params))
        .collect();
    if conditions.is_empty() {
        "TRUE".to_string()
    } else {
        conditions.join(" AND ")
    }
}

fn order_clause(specification: &BookSpecification) -> String {
    match specification.sort() {
        None => "b.id ASC".to_string(),
        Some((field, order)) => {
            let direction = match order {
                Order::Ascending => "ASC",
                Order::Descending => "DESC",
            };
            let column = if field.is_text() {
                format!("lower(b.{}) COLLATE \"C\"", field.column())
            } else {
                format!("b.{}", field.column())
            };
            format!("{column} {direction} NULLS LAST, b.id ASC")
        }
    }
}

fn as_query_params(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|param| param.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

/// Loads books with all associations, result follows the order of `book_ids`
async fn load_books<C: GenericClient + Sync>(
    client: &C,
    book_ids: &[BookId],
) -> Result<Vec<Book>, BookRepositoryError> {
    if book_ids.is_empty() {
        return Ok(vec![]);
    }
    let ids = book_ids.to_vec();

    let rows = client
        .query(
            "SELECT b.id, b.title, b.description, b.release_date, b.thumbnail, s.id, s.title, s.description \
             FROM books b LEFT JOIN series s ON s.id = b.series_id WHERE b.id = ANY($1)",
            &[&ids],
        )
        .await?;

    let mut books: HashMap<BookId, Book> = HashMap::with_capacity(rows.len());
    for row in rows.iter() {
        let book_id: BookId = row.try_get(0)?;
        let series_id: Option<SeriesId> = row.try_get(5)?;
        let series = match series_id {
            Some(id) => Some(Series {
                id,
                title: row.try_get(6)?,
                description: row.try_get(7)?,
            }),
            None => None,
        };
        books.insert(
            book_id,
            Book {
                id: Some(book_id),
                title: row.try_get(1)?,
                description: row.try_get(2)?,
                release_date: row.try_get::<_, Option<NaiveDate>>(3)?,
                thumbnail: row.try_get(4)?,
                series,
                ..Book::default()
            },
        );
    }

    let creator_rows = client
        .query(
            "SELECT c.book_id, c.role, pe.id, pe.full_name FROM creators c \
             JOIN persons pe ON pe.id = c.person_id \
             WHERE c.book_id = ANY($1) ORDER BY c.book_id, c.position",
            &[&ids],
        )
        .await?;
    for row in creator_rows.iter() {
        let book_id: BookId = row.try_get(0)?;
        let role: String = row.try_get(1)?;
        let role: Role = role.parse().map_err(BookRepositoryError::InvalidData)?;
        if let Some(book) = books.get_mut(&book_id) {
            book.creators.push(Creator {
                book_id: Some(book_id),
                person: Person {
                    id: Some(row.try_get(2)?),
                    full_name: row.try_get(3)?,
                },
                role,
            });
        }
    }

    let link_rows = client
        .query(
            "SELECT book_id, url, description FROM book_links \
             WHERE book_id = ANY($1) ORDER BY book_id, position",
            &[&ids],
        )
        .await?;
    for row in link_rows.iter() {
        let book_id: BookId = row.try_get(0)?;
        if let Some(book) = books.get_mut(&book_id) {
            book.links.push(BookLink {
                book_id: Some(book_id),
                url: row.try_get(1)?,
                description: row.try_get(2)?,
            });
        }
    }

    let genre_rows = client
        .query(
            "SELECT bg.book_id, g.id, g.name FROM book_genres bg \
             JOIN genres g ON g.id = bg.genre_id \
             WHERE bg.book_id = ANY($1) ORDER BY bg.book_id, bg.position",
            &[&ids],
        )
        .await?;
    for row in genre_rows.iter() {
        let book_id: BookId = row.try_get(0)?;
        if let Some(book) = books.get_mut(&book_id) {
            book.genres.push(Genre {
                id: row.try_get(1)?,
                name: row.try_get(2)?,
            });
        }
    }

    Ok(book_ids
        .iter()
        .filter_map(|book_id| books.remove(book_id))
        .collect())
}

fn genre_from_row(row: &Row) -> Result<Genre, BookRepositoryError> {
    Ok(Genre {
        id: row.try_get(0)?,
        name: row.try_get(1)?,
    })
}

async fn ensure_exists<C: GenericClient + Sync>(
    client: &C,
    statement: &str,
    id: i64,
    not_found: fn(i64) -> BookRepositoryError,
) -> Result<(), BookRepositoryError> {
    match client.query_opt(statement, &[&id]).await? {
        Some(_) => Ok(()),
        None => Err(not_found(id)),
    }
}

#[async_trait::async_trait]
impl BookRepository for PostgresBooksRepository {
    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError> {
        let client = self.client.lock().await;
        load_books(&*client, &[book_id])
            .await?
            .pop()
            .ok_or(BookRepositoryError::BookNotFound(book_id))
    }

    async fn get_thumbnail(&self, book_id: BookId) -> Result<Option<Vec<u8>>, BookRepositoryError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt("SELECT thumbnail FROM books WHERE id = $1", &[&book_id])
            .await?
            .ok_or(BookRepositoryError::BookNotFound(book_id))?;
        Ok(row.try_get(0)?)
    }

    async fn count_books(&self) -> Result<u64, BookRepositoryError> {
        let client = self.client.lock().await;
        let count: i64 = client
            .query_one("SELECT COUNT(*) FROM books", &[])
            .await?
            .try_get(0)?;
        Ok(count as u64)
    }

    async fn find_books(
        &self,
        specification: &BookSpecification,
        page_request: PageRequest,
    ) -> Result<Page<Book>, BookRepositoryError> {
        let mut params: Vec<SqlParam> = vec![];
        let condition = where_clause(specification, &mut params);
        let query_params = as_query_params(&params);

        let client = self.client.lock().await;
        let total_elements: i64 = client
            .query_one(
                &format!("SELECT COUNT(*) FROM books b WHERE {condition}"),
                &query_params,
            )
            .await?
            .try_get(0)?;

        let id_rows = client
            .query(
                &format!(
                    "SELECT b.id FROM books b WHERE {condition} ORDER BY {} LIMIT {} OFFSET {}",
                    order_clause(specification),
                    page_request.size,
                    page_request.offset()
                ),
                &query_params,
            )
            .await?;
        let book_ids = id_rows
            .iter()
            .map(|row| row.try_get(0))
            .collect::<Result<Vec<BookId>, _>>()?;

        Ok(Page {
            items: load_books(&*client, &book_ids).await?,
            total_elements: total_elements as u64,
            size: page_request.size,
        })
    }

    async fn search_text(&self, query: &str) -> Result<Vec<Book>, BookRepositoryError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT DISTINCT b.id FROM books b \
                 LEFT JOIN creators c ON b.id = c.book_id \
                 LEFT JOIN persons pe ON c.person_id = pe.id \
                 WHERE upper(b.title) LIKE upper($1) \
                 OR upper(b.description) LIKE upper($1) \
                 OR upper(pe.full_name) LIKE upper($1) \
                 ORDER BY b.id",
                &[&contains_pattern(query)],
            )
            .await?;
        let book_ids = rows
            .iter()
            .map(|row| row.try_get(0))
            .collect::<Result<Vec<BookId>, _>>()?;
        load_books(&*client, &book_ids).await
    }

    async fn save_book(&self, book: Book) -> Result<Book, BookRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        if let Some(series) = &book.series {
            ensure_exists(
                &transaction,
                "SELECT id FROM series WHERE id = $1",
                series.id,
                BookRepositoryError::SeriesNotFound,
            )
            .await?;
        }
        for person_id in book.creators.iter().filter_map(|creator| creator.person.id) {
            ensure_exists(
                &transaction,
                "SELECT id FROM persons WHERE id = $1",
                person_id,
                BookRepositoryError::PersonNotFound,
            )
            .await?;
        }
        for genre in book.genres.iter() {
            ensure_exists(
                &transaction,
                "SELECT id FROM genres WHERE id = $1",
                genre.id,
                BookRepositoryError::GenreNotFound,
            )
            .await?;
        }

        let series_id = book.series.as_ref().map(|series| series.id);
        let book_id: BookId = match book.id {
            Some(book_id) => {
                let updated = transaction
                    .execute(
                        "UPDATE books SET title = $1, description = $2, release_date = $3, \
                         thumbnail = $4, series_id = $5 WHERE id = $6",
                        &[
                            &book.title,
                            &book.description,
                            &book.release_date,
                            &book.thumbnail,
                            &series_id,
                            &book_id,
                        ],
                    )
                    .await?;
                if updated == 0 {
                    return Err(BookRepositoryError::BookNotFound(book_id));
                }
                book_id
            }
            None => transaction
                .query_one(
                    "INSERT INTO books (title, description, release_date, thumbnail, series_id) \
                     VALUES ($1, $2, $3, $4, $5) RETURNING id",
                    &[
                        &book.title,
                        &book.description,
                        &book.release_date,
                        &book.thumbnail,
                        &series_id,
                    ],
                )
                .await?
                .try_get(0)?,
        };

        transaction
            .execute("DELETE FROM creators WHERE book_id = $1", &[&book_id])
            .await?;
        for (position, creator) in book.creators.iter().enumerate() {
            let person_id: PersonId = match creator.person.id {
                Some(person_id) => person_id,
                None => transaction
                    .query_one(
                        "INSERT INTO persons (full_name) VALUES ($1) RETURNING id",
                        &[&creator.person.full_name],
                    )
                    .await?
                    .try_get(0)?,
            };
            transaction
                .execute(
                    "INSERT INTO creators (book_id, person_id, role, position) VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (book_id, person_id) DO UPDATE SET role = EXCLUDED.role",
                    &[&book_id, &person_id, &creator.role.as_str(), &(position as i32)],
                )
                .await?;
        }

        transaction
            .execute("DELETE FROM book_links WHERE book_id = $1", &[&book_id])
            .await?;
        for (position, link) in book.links.iter().enumerate() {
            transaction
                .execute(
                    "INSERT INTO book_links (book_id, url, description, position) VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (book_id, url) DO UPDATE SET description = EXCLUDED.description",
                    &[&book_id, &link.url, &link.description, &(position as i32)],
                )
                .await?;
        }

        transaction
            .execute("DELETE FROM book_genres WHERE book_id = $1", &[&book_id])
            .await?;
        for (position, genre) in book.genres.iter().enumerate() {
            transaction
                .execute(
                    "INSERT INTO book_genres (book_id, genre_id, position) VALUES ($1, $2, $3) \
                     ON CONFLICT DO NOTHING",
                    &[&book_id, &genre.id, &(position as i32)],
                )
                .await?;
        }

        transaction.commit().await?;
        tracing::debug!("Saved book {}", book_id);

        load_books(&*client, &[book_id])
            .await?
            .pop()
            .ok_or(BookRepositoryError::BookNotFound(book_id))
    }

    async fn get_person(&self, person_id: PersonId) -> Result<Person, BookRepositoryError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt("SELECT full_name FROM persons WHERE id = $1", &[&person_id])
            .await?
            .ok_or(BookRepositoryError::PersonNotFound(person_id))?;
        Ok(Person {
            id: Some(person_id),
            full_name: row.try_get(0)?,
        })
    }

    async fn get_genre(&self, genre_id: GenreId) -> Result<Genre, BookRepositoryError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt("SELECT name FROM genres WHERE id = $1", &[&genre_id])
            .await?
            .ok_or(BookRepositoryError::GenreNotFound(genre_id))?;
        Ok(Genre {
            id: genre_id,
            name: row.try_get(0)?,
        })
    }

    async fn find_genres_by_names(&self, names: &[String]) -> Result<Vec<Genre>, BookRepositoryError> {
        let names: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT id, name FROM genres WHERE lower(name) = ANY($1) ORDER BY id",
                &[&names],
            )
            .await?;
        rows.iter().map(genre_from_row).collect()
    }

    async fn list_genres(&self) -> Result<Vec<Genre>, BookRepositoryError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT id, name FROM genres ORDER BY lower(name) COLLATE \"C\", id",
                &[],
            )
            .await?;
        rows.iter().map(genre_from_row).collect()
    }

    async fn add_genre(&self, name: &str) -> Result<Genre, BookRepositoryError> {
        let client = self.client.lock().await;
        let id: GenreId = client
            .query_one("INSERT INTO genres (name) VALUES ($1) RETURNING id", &[&name])
            .await?
            .try_get(0)?;
        Ok(Genre {
            id,
            name: name.to_string(),
        })
    }

    async fn get_series(&self, series_id: SeriesId) -> Result<Series, BookRepositoryError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT title, description FROM series WHERE id = $1",
                &[&series_id],
            )
            .await?
            .ok_or(BookRepositoryError::SeriesNotFound(series_id))?;
        Ok(Series {
            id: series_id,
            title: row.try_get(0)?,
            description: row.try_get(1)?,
        })
    }

    async fn list_series_books(&self, series_id: SeriesId) -> Result<Vec<Book>, BookRepositoryError> {
        let client = self.client.lock().await;
        ensure_exists(
            &*client,
            "SELECT id FROM series WHERE id = $1",
            series_id,
            BookRepositoryError::SeriesNotFound,
        )
        .await?;
        let rows = client
            .query(
                "SELECT id FROM books WHERE series_id = $1 ORDER BY id",
                &[&series_id],
            )
            .await?;
        let book_ids = rows
            .iter()
            .map(|row| row.try_get(0))
            .collect::<Result<Vec<BookId>, _>>()?;
        load_books(&*client, &book_ids).await
    }

    async fn add_series(&self, title: &str, description: &str) -> Result<Series, BookRepositoryError> {
        let client = self.client.lock().await;
        let id: SeriesId = client
            .query_one(
                "INSERT INTO series (title, description) VALUES ($1, $2) RETURNING id",
                &[&title, &description],
            )
            .await?
            .try_get(0)?;
        Ok(Series {
            id,
            title: title.to_string(),
            description: description.to_string(),
        })
    }

    async fn update_series(&self, series: &Series) -> Result<Series, BookRepositoryError> {
        let client = self.client.lock().await;
        let updated = client
            .execute(
                "UPDATE series SET title = $1, description = $2 WHERE id = $3",
                &[&series.title, &series.description, &series.id],
            )
            .await?;
        if updated == 0 {
            return Err(BookRepositoryError::SeriesNotFound(series.id));
        }
        Ok(series.clone())
    }

    async fn list_series(&self) -> Result<Vec<Series>, BookRepositoryError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT id, title, description FROM series ORDER BY lower(title) COLLATE \"C\", id",
                &[],
            )
            .await?;
        rows.iter()
            .map(|row| -> Result<Series, BookRepositoryError> {
                Ok(Series {
                    id: row.try_get(0)?,
                    title: row.try_get(1)?,
                    description: row.try_get(2)?,
                })
            })
            .collect()
    }
}
