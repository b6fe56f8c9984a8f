use std::time::UNIX_EPOCH;

use base64::engine::general_purpose;
use base64::Engine as _;
use chrono::NaiveDate;

use bookbrowser_catalog::api::{
    BookDto, BookLinkDto, FindAllParams, Letter, Order, PersonCreatorDto, Role, SearchParams,
    SeriesSaveDto,
};
use bookbrowser_catalog::client::BookBrowserCatalogClient;

const CATALOG_URL: &str = "http://127.0.0.1:8080";

fn unique_suffix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

#[tokio::test]
/// Simple test for the catalog
/// Creates a book with creators, links and thumbnail
/// Gets the book and its thumbnail
/// Updates the title of the book
/// Finds the book through listing, search and text search
async fn bookbrowser_catalog_e2e_test() {
    let client = BookBrowserCatalogClient::new(CATALOG_URL).expect("Failed to create client");
    let suffix = unique_suffix();
    let thumbnail = vec![0xFFu8, 0xD8, 0xFF, 0xE0];

    let book = BookDto {
        title: Some(format!("Zebra crossing {suffix}")),
        description: Some(format!("Plot number {suffix}")),
        release_date: Some(NaiveDate::from_ymd_opt(1999, 12, 31)),
        thumbnail: Some(general_purpose::STANDARD.encode(&thumbnail)),
        creators: Some(vec![
            PersonCreatorDto {
                id: None,
                full_name: format!("Writer {suffix}"),
                role: Role::Author,
            },
            PersonCreatorDto {
                id: None,
                full_name: format!("Painter {suffix}"),
                role: Role::Illustrator,
            },
        ]),
        links: Some(vec![BookLinkDto {
            url: format!("https://example.org/books/{suffix}"),
            description: "Publisher page".to_string(),
        }]),
        ..BookDto::default()
    };

    let saved = client.save_book(&book).await.expect("Failed to save book");
    let book_id = saved.id.expect("Saved book has no id");
    assert_eq!(saved.title, book.title);
    assert_eq!(saved.creators.as_ref().map(Vec::len), Some(2));

    let returned = client
        .get_book(book_id)
        .await
        .expect("Failed to get book")
        .expect("Book not found");
    assert_eq!(returned, saved);

    let returned_thumbnail = client
        .get_thumbnail(book_id)
        .await
        .expect("Failed to get thumbnail");
    assert_eq!(returned_thumbnail, Some(thumbnail));

    let updated_title = format!("Zebra stripes {suffix}");
    let updated = client
        .save_book(&BookDto {
            id: Some(book_id),
            title: Some(updated_title.clone()),
            ..BookDto::default()
        })
        .await
        .expect("Failed to update book");
    assert_eq!(updated.title.as_deref(), Some(updated_title.as_str()));
    assert_eq!(updated.creators, saved.creators);
    assert_eq!(updated.links, saved.links);

    let page = client
        .find_all(&FindAllParams {
            page: 0,
            size: 1000,
            sort: "title".to_string(),
            order: Order::Ascending,
            start_release_date: NaiveDate::from_ymd_opt(1999, 1, 1),
            end_release_date: NaiveDate::from_ymd_opt(1999, 12, 31),
            title_letter: Some(Letter::Z),
        })
        .await
        .expect("Failed to list books");
    assert!(page.items.iter().any(|book| book.id == Some(book_id)));

    let found = client
        .search(&SearchParams {
            page: 0,
            size: 10,
            query: Some(format!("stripes {suffix}")),
            genres: None,
        })
        .await
        .expect("Failed to search books");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, book_id);

    let found = client
        .search_text(&format!("Painter {suffix}"))
        .await
        .expect("Failed to search books by text");
    assert!(found.iter().any(|book| book.id == book_id));

    let missing = client
        .get_book(i64::MAX)
        .await
        .expect("Failed to get missing book");
    assert!(missing.is_none());
}

#[tokio::test]
async fn bookbrowser_catalog_reference_data_test() {
    let client = BookBrowserCatalogClient::new(CATALOG_URL).expect("Failed to create client");

    let reference_data = client
        .reference_data()
        .await
        .expect("Failed to get reference data");

    assert_eq!(
        reference_data.roles,
        vec![Role::Author, Role::Illustrator, Role::Translator]
    );
    assert_eq!(reference_data.letters.len(), 27);
    assert_eq!(reference_data.letters[26].label, "#");
}

#[tokio::test]
async fn bookbrowser_catalog_rejects_invalid_sort_test() {
    let client = BookBrowserCatalogClient::new(CATALOG_URL).expect("Failed to create client");

    let result = client
        .find_all(&FindAllParams {
            page: 0,
            size: 10,
            sort: "publisher".to_string(),
            order: Order::Descending,
            start_release_date: None,
            end_release_date: None,
            title_letter: None,
        })
        .await;

    assert!(result.is_err());
}

#[tokio::test]
/// Creates a genre and a series, assigns them to a book
/// and finds the book by genre and through the series
async fn bookbrowser_catalog_genre_and_series_test() {
    let client = BookBrowserCatalogClient::new(CATALOG_URL).expect("Failed to create client");
    let suffix = unique_suffix();

    let genre = client
        .add_genre(&format!("Genre {suffix}"))
        .await
        .expect("Failed to add genre");
    assert!(client
        .add_genre(&format!("GENRE {suffix}"))
        .await
        .is_err());

    let series = client
        .save_series(&SeriesSaveDto {
            title: Some(format!("Series {suffix}")),
            description: Some("Saga".to_string()),
            ..SeriesSaveDto::default()
        })
        .await
        .expect("Failed to save series");

    let book = client
        .save_book(&BookDto {
            title: Some(format!("Part one {suffix}")),
            description: Some("".to_string()),
            genres: Some(vec![genre.clone()]),
            series_id: Some(series.id),
            ..BookDto::default()
        })
        .await
        .expect("Failed to save book");
    let book_id = book.id.expect("Saved book has no id");

    let found = client
        .search(&SearchParams {
            page: 0,
            size: 10,
            query: None,
            genres: Some(genre.name.clone()),
        })
        .await
        .expect("Failed to search by genre");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, book_id);

    let renamed = client
        .save_series(&SeriesSaveDto {
            id: Some(series.id),
            title: Some(format!("Renamed series {suffix}")),
            ..SeriesSaveDto::default()
        })
        .await
        .expect("Failed to rename series");
    assert_eq!(renamed.description, "Saga");
    assert_eq!(renamed.books.len(), 1);

    let listed = client.list_series().await.expect("Failed to list series");
    assert!(listed
        .iter()
        .any(|summary| summary.id == series.id && summary.title == renamed.title));

    let loaded = client
        .get_series(series.id)
        .await
        .expect("Failed to get series")
        .expect("Series not found");
    assert_eq!(loaded, renamed);
}
