use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Deserializer, Serialize};

pub type BookId = i64;
pub type PersonId = i64;
pub type GenreId = i64;
pub type SeriesId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Apiv2Schema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Contribution of a person to a book
pub enum Role {
    Author,
    Illustrator,
    Translator,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Author, Role::Illustrator, Role::Translator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "AUTHOR",
            Role::Illustrator => "ILLUSTRATOR",
            Role::Translator => "TRANSLATOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("{value} is not a valid role"))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub enum Order {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Ascending,
    #[serde(rename = "DESC", alias = "desc")]
    Descending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Apiv2Schema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// First character bucket of a book title, `NonAlpha` covers everything that is not an ASCII letter
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    NonAlpha,
}

impl Letter {
    pub const ALL: [Letter; 27] = [
        Letter::A,
        Letter::B,
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::H,
        Letter::I,
        Letter::J,
        Letter::K,
        Letter::L,
        Letter::M,
        Letter::N,
        Letter::O,
        Letter::P,
        Letter::Q,
        Letter::R,
        Letter::S,
        Letter::T,
        Letter::U,
        Letter::V,
        Letter::W,
        Letter::X,
        Letter::Y,
        Letter::Z,
        Letter::NonAlpha,
    ];

    /// Uppercase ASCII letter of the bucket, None for `NonAlpha`
    pub fn as_char(&self) -> Option<char> {
        let index = Letter::ALL.iter().position(|letter| letter == self)?;
        if index < 26 {
            Some((b'A' + index as u8) as char)
        } else {
            None
        }
    }

    pub fn label(&self) -> String {
        self.as_char()
            .map(String::from)
            .unwrap_or_else(|| "#".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct PersonCreatorDto {
    #[serde(default)]
    pub id: Option<PersonId>,
    #[serde(default)]
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct GenreDto {
    #[serde(default)]
    pub id: Option<GenreId>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct BookLinkDto {
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Full representation of a book.
/// When used for saving, fields that are not set are left untouched on the stored book
/// and an empty list clears the corresponding relation.
pub struct BookDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BookId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Outer option tells if the field was sent at all, explicit `null` clears the date
    #[serde(
        default,
        deserialize_with = "deserialize_explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub release_date: Option<Option<NaiveDate>>,
    /// Base64 encoded image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creators: Option<Vec<PersonCreatorDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<GenreDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<BookLinkDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<SeriesId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_title: Option<String>,
}

fn deserialize_explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
/// Short representation of a book used in search results
pub struct BookSummaryDto {
    pub id: BookId,
    pub title: String,
    pub description: String,
    pub creators: Vec<PersonCreatorDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct PageDto<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SeriesDto {
    pub id: SeriesId,
    pub title: String,
    pub description: String,
    pub books: Vec<BookDto>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Series details used for saving.
/// Without id a new series is created, otherwise fields that are not set are left untouched.
pub struct SeriesSaveDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SeriesId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SeriesSummaryDto {
    pub id: SeriesId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct LetterDto {
    pub label: String,
    pub value: Letter,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
/// Values used by clients to build filters and forms
pub struct ReferenceDataDto {
    pub roles: Vec<Role>,
    pub genres: Vec<GenreDto>,
    pub letters: Vec<LetterDto>,
}

fn default_page_size() -> u32 {
    20
}

fn default_sort_field() -> String {
    "id".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct SearchParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
    #[serde(default)]
    pub query: Option<String>,
    /// Comma separated list of genre names
    #[serde(default)]
    pub genres: Option<String>,
}

impl SearchParams {
    pub fn genre_names(&self) -> Option<Vec<String>> {
        self.genres.as_ref().map(|genres| {
            genres
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct TextSearchParams {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct FindAllParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
    #[serde(default = "default_sort_field")]
    pub sort: String,
    #[serde(default)]
    pub order: Order,
    #[serde(default)]
    pub start_release_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_release_date: Option<NaiveDate>,
    #[serde(default)]
    pub title_letter: Option<Letter>,
}
