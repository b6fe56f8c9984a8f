use chrono::NaiveDate;

use crate::api::{BookId, GenreId, PersonId, Role, SeriesId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// None until the person is persisted
    pub id: Option<PersonId>,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub id: SeriesId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CreatorKey {
    pub book_id: BookId,
    pub person_id: PersonId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Association of a person with a book in a given role
pub struct Creator {
    pub book_id: Option<BookId>,
    pub person: Person,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookLinkKey {
    pub book_id: BookId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLink {
    pub book_id: Option<BookId>,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Book together with all the rows it owns (creators, links, genre associations)
pub struct Book {
    pub id: Option<BookId>,
    pub title: String,
    pub description: String,
    pub release_date: Option<NaiveDate>,
    pub thumbnail: Option<Vec<u8>>,
    pub creators: Vec<Creator>,
    pub links: Vec<BookLink>,
    pub genres: Vec<Genre>,
    pub series: Option<Series>,
}

impl Book {
    /// Replaces all creators, a repeated person keeps the role given last
    pub fn replace_creators(&mut self, creators: Vec<Creator>) {
        self.creators.clear();
        for creator in creators {
            let existing = creator.person.id.and_then(|person_id| {
                self.creators
                    .iter_mut()
                    .find(|current| current.person.id == Some(person_id))
            });
            match existing {
                Some(existing) => existing.role = creator.role,
                None => self.creators.push(creator),
            }
        }
    }

    /// Replaces all links, a repeated url keeps its first position and the description given last
    pub fn replace_links(&mut self, links: Vec<BookLink>) {
        self.links.clear();
        for link in links {
            match self.links.iter_mut().find(|current| current.url == link.url) {
                Some(existing) => existing.description = link.description,
                None => self.links.push(link),
            }
        }
    }

    pub fn replace_genres(&mut self, genres: Vec<Genre>) {
        self.genres.clear();
        for genre in genres {
            if !self.genres.iter().any(|current| current.id == genre.id) {
                self.genres.push(genre);
            }
        }
    }
}

#[cfg(test)]
mod entity_tests {
    use super::*;

    fn person(id: Option<PersonId>, name: &str) -> Person {
        Person {
            id,
            full_name: name.to_string(),
        }
    }

    #[test]
    fn test_replace_creators_collapses_same_person() {
        let mut book = Book {
            creators: vec![Creator {
                book_id: Some(1),
                person: person(Some(9), "Old"),
                role: Role::Author,
            }],
            ..Book::default()
        };

        book.replace_creators(vec![
            Creator {
                book_id: Some(1),
                person: person(Some(2), "Ann"),
                role: Role::Author,
            },
            Creator {
                book_id: Some(1),
                person: person(None, "New one"),
                role: Role::Translator,
            },
            Creator {
                book_id: Some(1),
                person: person(None, "New one"),
                role: Role::Translator,
            },
            Creator {
                book_id: Some(1),
                person: person(Some(2), "Ann"),
                role: Role::Illustrator,
            },
        ]);

        // persons without id are separate new persons, so they are not collapsed
        assert_eq!(book.creators.len(), 3);
        assert_eq!(book.creators[0].role, Role::Illustrator);
        assert_eq!(book.creators[0].person.id, Some(2));
        assert_eq!(book.creators[1].person.id, None);
    }

    #[test]
    fn test_replace_links_last_description_wins() {
        let mut book = Book::default();
        let link = |url: &str, description: &str| BookLink {
            book_id: None,
            url: url.to_string(),
            description: description.to_string(),
        };

        book.replace_links(vec![
            link("http://a", "first"),
            link("http://b", "b"),
            link("http://a", "second"),
        ]);

        assert_eq!(
            book.links,
            vec![link("http://a", "second"), link("http://b", "b")]
        );
    }
}
