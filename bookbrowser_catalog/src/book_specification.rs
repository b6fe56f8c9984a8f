use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::api::{GenreId, Letter, Order};
use crate::entity::{Book, Genre};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0} is a not a valid sort parameter")]
pub struct InvalidSortField(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Attributes of a book that results can be sorted by
pub enum SortField {
    Id,
    Title,
    Description,
    ReleaseDate,
}

impl SortField {
    /// True for text columns, which are ordered ignoring case
    pub fn is_text(&self) -> bool {
        matches!(self, SortField::Title | SortField::Description)
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Title => "title",
            SortField::Description => "description",
            SortField::ReleaseDate => "release_date",
        }
    }
}

impl FromStr for SortField {
    type Err = InvalidSortField;

    fn from_str(field_name: &str) -> Result<Self, Self::Err> {
        match field_name {
            "id" => Ok(SortField::Id),
            "title" => Ok(SortField::Title),
            "description" => Ok(SortField::Description),
            "release_date" | "releaseDate" => Ok(SortField::ReleaseDate),
            other => Err(InvalidSortField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Single filter condition on a book, conditions of a specification are joined with AND
pub enum BookPredicate {
    /// Case insensitive match on title, description or full name of any creator
    HasText(String),
    /// Book has at least one of the genres
    HasGenres(Vec<GenreId>),
    ReleaseDateGreaterThanOrEqual(NaiveDate),
    ReleaseDateLessThanOrEqual(NaiveDate),
    TitleStartsWith(Letter),
}

impl BookPredicate {
    pub fn has_text(query: &str) -> Self {
        BookPredicate::HasText(query.to_string())
    }

    pub fn has_genres(genres: &[Genre]) -> Self {
        BookPredicate::HasGenres(genres.iter().map(|genre| genre.id).collect())
    }

    pub fn release_date_greater_than_or_equal(date: NaiveDate) -> Self {
        BookPredicate::ReleaseDateGreaterThanOrEqual(date)
    }

    pub fn release_date_less_than_or_equal(date: NaiveDate) -> Self {
        BookPredicate::ReleaseDateLessThanOrEqual(date)
    }

    pub fn title_starts_with(letter: Letter) -> Self {
        BookPredicate::TitleStartsWith(letter)
    }

    pub fn matches(&self, book: &Book) -> bool {
        match self {
            BookPredicate::HasText(query) => {
                let query = query.to_lowercase();
                book.title.to_lowercase().contains(&query)
                    || book.description.to_lowercase().contains(&query)
                    || book
                        .creators
                        .iter()
                        .any(|creator| creator.person.full_name.to_lowercase().contains(&query))
            }
            BookPredicate::HasGenres(genre_ids) => book
                .genres
                .iter()
                .any(|genre| genre_ids.contains(&genre.id)),
            BookPredicate::ReleaseDateGreaterThanOrEqual(date) => {
                book.release_date.is_some_and(|release| release >= *date)
            }
            BookPredicate::ReleaseDateLessThanOrEqual(date) => {
                book.release_date.is_some_and(|release| release <= *date)
            }
            BookPredicate::TitleStartsWith(letter) => match (book.title.chars().next(), letter.as_char()) {
                (Some(first), Some(expected)) => first.to_ascii_uppercase() == expected,
                (Some(first), None) => !first.is_ascii_alphabetic(),
                (None, _) => false,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Deferred query on books: a conjunction of predicates and an optional sort order.
/// The default specification matches every book.
pub struct BookSpecification {
    predicates: Vec<BookPredicate>,
    sort: Option<(SortField, Order)>,
}

impl BookSpecification {
    pub fn order_by(field: SortField, order: Order) -> Self {
        Self {
            predicates: vec![],
            sort: Some((field, order)),
        }
    }

    pub fn and(mut self, predicate: BookPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[BookPredicate] {
        &self.predicates
    }

    pub fn sort(&self) -> Option<(SortField, Order)> {
        self.sort
    }

    /// True when no predicate narrows the result
    pub fn is_unconstrained(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, book: &Book) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(book))
    }

    /// Ordering of results, ties (and unsorted specifications) fall back to ascending id.
    /// Books without release date always go last.
    pub fn compare(&self, a: &Book, b: &Book) -> Ordering {
        let by_field = match self.sort {
            None | Some((SortField::Id, Order::Ascending)) => Ordering::Equal,
            Some((SortField::Id, Order::Descending)) => b.id.cmp(&a.id),
            Some((SortField::Title, order)) => directed(compare_text(&a.title, &b.title), order),
            Some((SortField::Description, order)) => {
                directed(compare_text(&a.description, &b.description), order)
            }
            Some((SortField::ReleaseDate, order)) => match (a.release_date, b.release_date) {
                (Some(a_date), Some(b_date)) => directed(a_date.cmp(&b_date), order),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
            },
        };
        by_field.then_with(|| a.id.cmp(&b.id))
    }
}

/// Text columns are ordered by their lowercase form compared codepoint by codepoint
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn directed(ordering: Ordering, order: Order) -> Ordering {
    match order {
        Order::Ascending => ordering,
        Order::Descending => ordering.reverse(),
    }
}

#[cfg(test)]
mod book_specification_tests {
    use crate::api::Role;
    use crate::entity::{Creator, Person};

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn book(id: i64, title: &str, release_date: Option<NaiveDate>) -> Book {
        Book {
            id: Some(id),
            title: title.to_string(),
            description: format!("Description of {title}"),
            release_date,
            ..Book::default()
        }
    }

    #[test]
    fn test_sort_field_allow_list() {
        assert_eq!("title".parse::<SortField>(), Ok(SortField::Title));
        assert_eq!("releaseDate".parse::<SortField>(), Ok(SortField::ReleaseDate));
        assert_eq!("release_date".parse::<SortField>(), Ok(SortField::ReleaseDate));
        assert_eq!(
            "nonexistent".parse::<SortField>(),
            Err(InvalidSortField("nonexistent".to_string()))
        );
        // relations are not sortable
        assert!("creators".parse::<SortField>().is_err());
    }

    #[test]
    fn test_empty_specification_matches_everything() {
        let specification = BookSpecification::default();
        assert!(specification.is_unconstrained());
        assert!(specification.matches(&book(1, "", None)));
    }

    #[test]
    fn test_has_text_checks_title_description_and_creators() {
        let mut dune = book(1, "Dune", None);
        dune.creators.push(Creator {
            book_id: Some(1),
            person: Person {
                id: Some(3),
                full_name: "Frank Herbert".to_string(),
            },
            role: Role::Author,
        });

        assert!(BookPredicate::has_text("dUNE").matches(&dune));
        assert!(BookPredicate::has_text("description of").matches(&dune));
        assert!(BookPredicate::has_text("herb").matches(&dune));
        assert!(!BookPredicate::has_text("tolkien").matches(&dune));
    }

    #[test]
    fn test_has_genres_needs_any_genre() {
        let mut fantasy_book = book(1, "Hobbit", None);
        fantasy_book.genres.push(Genre {
            id: 4,
            name: "Fantasy".to_string(),
        });
        let genres = vec![
            Genre {
                id: 4,
                name: "Fantasy".to_string(),
            },
            Genre {
                id: 5,
                name: "Horror".to_string(),
            },
        ];

        assert!(BookPredicate::has_genres(&genres).matches(&fantasy_book));
        assert!(!BookPredicate::has_genres(&genres[1..]).matches(&fantasy_book));
        assert!(!BookPredicate::has_genres(&genres).matches(&book(2, "No genres", None)));
    }

    #[test]
    fn test_release_date_bounds_are_inclusive() {
        let specification = BookSpecification::default()
            .and(BookPredicate::release_date_greater_than_or_equal(date(2000, 1, 1)))
            .and(BookPredicate::release_date_less_than_or_equal(date(2000, 12, 31)));

        assert!(specification.matches(&book(1, "a", Some(date(2000, 1, 1)))));
        assert!(specification.matches(&book(2, "b", Some(date(2000, 12, 31)))));
        assert!(!specification.matches(&book(3, "c", Some(date(2001, 1, 1)))));
        assert!(!specification.matches(&book(4, "d", None)));
    }

    #[test]
    fn test_title_starts_with_letter() {
        let predicate = BookPredicate::title_starts_with(Letter::H);
        assert!(predicate.matches(&book(1, "Hobbit", None)));
        assert!(predicate.matches(&book(2, "hobbit", None)));
        assert!(!predicate.matches(&book(3, "The Hobbit", None)));

        let non_alpha = BookPredicate::title_starts_with(Letter::NonAlpha);
        assert!(non_alpha.matches(&book(4, "1984", None)));
        assert!(non_alpha.matches(&book(5, "'Salem's Lot", None)));
        assert!(!non_alpha.matches(&book(6, "Emma", None)));
        assert!(!non_alpha.matches(&book(7, "", None)));
    }

    #[test]
    fn test_compare_by_release_date_puts_missing_dates_last() {
        let mut books = vec![
            book(1, "a", None),
            book(2, "b", Some(date(1990, 1, 1))),
            book(3, "c", Some(date(2010, 1, 1))),
            book(4, "d", Some(date(1990, 1, 1))),
        ];

        let ascending = BookSpecification::order_by(SortField::ReleaseDate, Order::Ascending);
        books.sort_by(|a, b| ascending.compare(a, b));
        let ids: Vec<_> = books.iter().filter_map(|book| book.id).collect();
        assert_eq!(ids, vec![2, 4, 3, 1]);

        let descending = BookSpecification::order_by(SortField::ReleaseDate, Order::Descending);
        books.sort_by(|a, b| descending.compare(a, b));
        let ids: Vec<_> = books.iter().filter_map(|book| book.id).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_compare_by_title_ignores_case() {
        let mut books = vec![
            book(1, "Zebra", None),
            book(2, "apple", None),
            book(3, "Apple", None),
            book(4, "mango", None),
        ];

        let ascending = BookSpecification::order_by(SortField::Title, Order::Ascending);
        books.sort_by(|a, b| ascending.compare(a, b));
        let ids: Vec<_> = books.iter().filter_map(|book| book.id).collect();
        assert_eq!(ids, vec![2, 3, 4, 1]);

        let descending = BookSpecification::order_by(SortField::Title, Order::Descending);
        books.sort_by(|a, b| descending.compare(a, b));
        let ids: Vec<_> = books.iter().filter_map(|book| book.id).collect();
        assert_eq!(ids, vec![1, 4, 2, 3]);
        assert!(SortField::Title.is_text());
        assert!(!SortField::ReleaseDate.is_text());
    }
}
