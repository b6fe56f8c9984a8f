use crate::api::{
    BookDto, BookLinkDto, BookSummaryDto, GenreDto, Letter, LetterDto, PersonCreatorDto, SeriesDto,
    SeriesSummaryDto,
};
use crate::entity::{Book, BookLink, Creator, Genre, Series};

pub fn genre_to_genre_dto(genre: &Genre) -> GenreDto {
    GenreDto {
        id: Some(genre.id),
        name: genre.name.clone(),
    }
}

pub fn book_link_to_book_link_dto(link: &BookLink) -> BookLinkDto {
    BookLinkDto {
        url: link.url.clone(),
        description: link.description.clone(),
    }
}

pub fn letter_to_letter_dto(letter: Letter) -> LetterDto {
    LetterDto {
        label: letter.label(),
        value: letter,
    }
}

pub fn creator_to_person_creator_dto(creator: &Creator) -> PersonCreatorDto {
    PersonCreatorDto {
        id: creator.person.id,
        full_name: creator.person.full_name.clone(),
        role: creator.role,
    }
}

/// Thumbnail is not part of the result, it is served separately
pub fn book_to_book_dto(book: &Book) -> BookDto {
    BookDto {
        id: book.id,
        title: Some(book.title.clone()),
        description: Some(book.description.clone()),
        release_date: Some(book.release_date),
        thumbnail: None,
        creators: Some(book.creators.iter().map(creator_to_person_creator_dto).collect()),
        genres: Some(book.genres.iter().map(genre_to_genre_dto).collect()),
        links: Some(book.links.iter().map(book_link_to_book_link_dto).collect()),
        series_id: book.series.as_ref().map(|series| series.id),
        series_title: book.series.as_ref().map(|series| series.title.clone()),
    }
}

/// Summaries only exist for persisted books, None is returned for a book without id
pub fn book_to_book_summary_dto(book: &Book) -> Option<BookSummaryDto> {
    Some(BookSummaryDto {
        id: book.id?,
        title: book.title.clone(),
        description: book.description.clone(),
        creators: book.creators.iter().map(creator_to_person_creator_dto).collect(),
    })
}

pub fn series_to_series_summary_dto(series: &Series) -> SeriesSummaryDto {
    SeriesSummaryDto {
        id: series.id,
        title: series.title.clone(),
        description: series.description.clone(),
    }
}

pub fn series_to_series_dto(series: &Series, books: &[Book]) -> SeriesDto {
    SeriesDto {
        id: series.id,
        title: series.title.clone(),
        description: series.description.clone(),
        books: books.iter().map(book_to_book_dto).collect(),
    }
}
