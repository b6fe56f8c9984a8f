use actix_web::http::header::LOCATION;
use actix_web::web::Data;
use actix_web::Error;
use actix_web::HttpResponse;
use paperclip::actix::{
    api_v2_operation,
    web::{self},
};

use crate::api::{
    BookDto, BookId, FindAllParams, GenreDto, SearchParams, SeriesId, SeriesSaveDto,
    TextSearchParams,
};
use crate::book_service::{BookFilter, BookService, BookServiceError};

fn error_response(operation: &str, err: BookServiceError) -> HttpResponse {
    match err {
        BookServiceError::NotFound(message) => HttpResponse::NotFound().json(message),
        BookServiceError::InvalidArgument(message) => HttpResponse::BadRequest().json(message),
        BookServiceError::ImageUploadFailure(_) => HttpResponse::BadRequest().json(err.to_string()),
        BookServiceError::Repository(_) => {
            tracing::error!("{} failed {}", operation, err);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn find_all_books(
    book_service: Data<BookService>,
    params: web::Query<FindAllParams>,
) -> Result<HttpResponse, Error> {
    let params = params.into_inner();
    let filter = BookFilter {
        start_release_date: params.start_release_date,
        end_release_date: params.end_release_date,
        title_letter: params.title_letter,
    };
    Ok(
        match book_service
            .find_all(params.page, params.size, &params.sort, params.order, filter)
            .await
        {
            Ok(page) => HttpResponse::Ok().json(page),
            Err(err) => error_response("Find all books", err),
        },
    )
}

#[api_v2_operation]
pub async fn search_books(
    book_service: Data<BookService>,
    params: web::Query<SearchParams>,
) -> Result<HttpResponse, Error> {
    let genre_names = params.genre_names();
    let params = params.into_inner();
    Ok(
        match book_service
            .search(params.page, params.size, params.query, genre_names)
            .await
        {
            Ok(books) => HttpResponse::Ok().json(books),
            Err(err) => error_response("Search books", err),
        },
    )
}

#[api_v2_operation]
pub async fn search_books_by_text(
    book_service: Data<BookService>,
    params: web::Query<TextSearchParams>,
) -> Result<HttpResponse, Error> {
    Ok(match book_service.search_text(&params.query).await {
        Ok(books) => HttpResponse::Ok().json(books),
        Err(err) => error_response("Text search", err),
    })
}

#[api_v2_operation]
pub async fn save_book(
    book_service: Data<BookService>,
    book: web::Json<BookDto>,
) -> Result<HttpResponse, Error> {
    Ok(match book_service.save(book.into_inner()).await {
        Ok(saved) => match saved.id {
            Some(book_id) => HttpResponse::Ok()
                .append_header((LOCATION, format!("/api/book/{book_id}")))
                .json(saved),
            None => {
                tracing::error!("Save book failed, stored book has no id");
                HttpResponse::InternalServerError().finish()
            }
        },
        Err(err) => error_response("Save book", err),
    })
}

#[api_v2_operation]
pub async fn get_book(
    book_service: Data<BookService>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(match book_service.get_by_id(book_id.into_inner()).await {
        Ok(book) => HttpResponse::Ok().json(book),
        Err(err) => error_response("Get book", err),
    })
}

#[api_v2_operation]
pub async fn get_book_thumbnail(
    book_service: Data<BookService>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match book_service.find_thumbnail(book_id.into_inner()).await {
            Ok(Some(thumbnail)) => HttpResponse::Ok()
                .content_type("application/octet-stream")
                .body(thumbnail),
            Ok(None) => HttpResponse::NoContent().finish(),
            Err(err) => error_response("Get thumbnail", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_series(
    book_service: Data<BookService>,
    series_id: web::Path<SeriesId>,
) -> Result<HttpResponse, Error> {
    Ok(match book_service.get_series(series_id.into_inner()).await {
        Ok(series) => HttpResponse::Ok().json(series),
        Err(err) => error_response("Get series", err),
    })
}

#[api_v2_operation]
pub async fn list_series(book_service: Data<BookService>) -> Result<HttpResponse, Error> {
    Ok(match book_service.list_series().await {
        Ok(series) => HttpResponse::Ok().json(series),
        Err(err) => error_response("List series", err),
    })
}

#[api_v2_operation]
pub async fn save_series(
    book_service: Data<BookService>,
    series: web::Json<SeriesSaveDto>,
) -> Result<HttpResponse, Error> {
    Ok(match book_service.save_series(series.into_inner()).await {
        Ok(saved) => HttpResponse::Ok()
            .append_header((LOCATION, format!("/api/series/{}", saved.id)))
            .json(saved),
        Err(err) => error_response("Save series", err),
    })
}

#[api_v2_operation]
pub async fn add_genre(
    book_service: Data<BookService>,
    genre: web::Json<GenreDto>,
) -> Result<HttpResponse, Error> {
    Ok(match book_service.add_genre(genre.into_inner()).await {
        Ok(added) => HttpResponse::Ok().json(added),
        Err(err) => error_response("Add genre", err),
    })
}

#[api_v2_operation]
pub async fn get_reference_data(book_service: Data<BookService>) -> Result<HttpResponse, Error> {
    Ok(match book_service.reference_data().await {
        Ok(reference_data) => HttpResponse::Ok().json(reference_data),
        Err(err) => error_response("Get reference data", err),
    })
}

#[cfg(test)]
mod handler_tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use base64::engine::general_purpose;
    use base64::Engine as _;
    use paperclip::actix::OpenApiExt;

    use crate::api::{BookSummaryDto, PageDto, ReferenceDataDto, SeriesDto, SeriesSummaryDto};
    use crate::app_config::config_app;
    use crate::books_repository::InMemoryBookRepository;

    use super::*;

    fn book_service() -> Data<BookService> {
        Data::new(BookService::new(Arc::new(InMemoryBookRepository::default())))
    }

    #[actix_web::test]
    /// Saves a book through the api and reads it back together with its thumbnail
    async fn test_save_and_get_book() {
        let app = test::init_service(
            App::new()
                .wrap_api()
                .app_data(book_service())
                .configure(config_app)
                .build(),
        )
        .await;

        let book = BookDto {
            title: Some("Solaris".to_string()),
            description: Some("Ocean".to_string()),
            thumbnail: Some(general_purpose::STANDARD.encode([1u8, 2, 3])),
            ..BookDto::default()
        };
        let request = test::TestRequest::post()
            .uri("/api/book")
            .set_json(&book)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let saved: BookDto = test::read_body_json(response).await;
        let book_id = saved.id.expect("No id assigned");
        assert_eq!(location, Some(format!("/api/book/{book_id}")));

        let request = test::TestRequest::get()
            .uri(&format!("/api/book/{book_id}"))
            .to_request();
        let loaded: BookDto = test::call_and_read_body_json(&app, request).await;
        assert_eq!(loaded, saved);

        let request = test::TestRequest::get()
            .uri(&format!("/api/book/{book_id}/thumbnail"))
            .to_request();
        let thumbnail = test::call_and_read_body(&app, request).await;
        assert_eq!(thumbnail.as_ref(), &[1u8, 2, 3]);

        let request = test::TestRequest::get()
            .uri(&format!("/api/book/{}", book_id + 1))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    /// Checks mapping of validation errors to bad request
    async fn test_invalid_requests() {
        let app = test::init_service(
            App::new()
                .wrap_api()
                .app_data(book_service())
                .configure(config_app)
                .build(),
        )
        .await;

        let request = test::TestRequest::get()
            .uri("/api/books?sort=nonexistent")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = test::TestRequest::post()
            .uri("/api/book")
            .set_json(BookDto {
                title: Some("Broken".to_string()),
                thumbnail: Some("%%%".to_string()),
                ..BookDto::default()
            })
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_listing_endpoints() {
        let service = book_service();
        for title in ["Carrie", "Christine", "Misery"] {
            service
                .save(BookDto {
                    title: Some(title.to_string()),
                    description: Some("".to_string()),
                    ..BookDto::default()
                })
                .await
                .unwrap();
        }
        let app = test::init_service(
            App::new()
                .wrap_api()
                .app_data(service.clone())
                .configure(config_app)
                .build(),
        )
        .await;

        let request = test::TestRequest::get()
            .uri("/api/books?sort=title&order=DESC&size=2&title_letter=C")
            .to_request();
        let page: PageDto<BookDto> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(page.total_pages, 1);
        let titles: Vec<_> = page.items.iter().filter_map(|b| b.title.clone()).collect();
        assert_eq!(titles, vec!["Christine", "Carrie"]);

        let request = test::TestRequest::get()
            .uri("/api/books/search?query=mis")
            .to_request();
        let found: Vec<BookSummaryDto> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Misery");

        let request = test::TestRequest::get()
            .uri("/api/books/search?genres=Unknown")
            .to_request();
        let found: Vec<BookSummaryDto> = test::call_and_read_body_json(&app, request).await;
        assert!(found.is_empty());

        let request = test::TestRequest::get()
            .uri("/api/reference-data")
            .to_request();
        let reference_data: ReferenceDataDto = test::call_and_read_body_json(&app, request).await;
        assert_eq!(reference_data.letters.len(), 27);

        let request = test::TestRequest::get().uri("/api/series/1").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    /// Creates a genre and a series through the api and assigns both to a book
    async fn test_manage_genres_and_series() {
        let app = test::init_service(
            App::new()
                .wrap_api()
                .app_data(book_service())
                .configure(config_app)
                .build(),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/api/genre")
            .set_json(GenreDto {
                id: None,
                name: "Fantasy".to_string(),
            })
            .to_request();
        let fantasy: GenreDto = test::call_and_read_body_json(&app, request).await;
        assert!(fantasy.id.is_some());

        let request = test::TestRequest::post()
            .uri("/api/genre")
            .set_json(GenreDto {
                id: None,
                name: "fantasy".to_string(),
            })
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = test::TestRequest::post()
            .uri("/api/series")
            .set_json(SeriesSaveDto {
                title: Some("Earthsea".to_string()),
                ..SeriesSaveDto::default()
            })
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let series: SeriesDto = test::read_body_json(response).await;

        let request = test::TestRequest::post()
            .uri("/api/book")
            .set_json(BookDto {
                title: Some("A Wizard of Earthsea".to_string()),
                description: Some("Ged".to_string()),
                genres: Some(vec![fantasy.clone()]),
                series_id: Some(series.id),
                ..BookDto::default()
            })
            .to_request();
        let saved: BookDto = test::call_and_read_body_json(&app, request).await;
        assert_eq!(saved.genres, Some(vec![fantasy]));
        assert_eq!(saved.series_title.as_deref(), Some("Earthsea"));

        let request = test::TestRequest::get().uri("/api/series").to_request();
        let listed: Vec<SeriesSummaryDto> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, series.id);

        let request = test::TestRequest::get()
            .uri(&format!("/api/series/{}", series.id))
            .to_request();
        let loaded: SeriesDto = test::call_and_read_body_json(&app, request).await;
        assert_eq!(loaded.books, vec![saved]);
    }
}
