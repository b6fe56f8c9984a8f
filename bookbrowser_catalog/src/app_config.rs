use paperclip::actix::web;

use crate::handlers;

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/api")
                .service(web::resource("/books").route(web::get().to(handlers::find_all_books)))
                .service(
                    web::resource("/books/search").route(web::get().to(handlers::search_books)),
                )
                .service(
                    web::resource("/books/text-search")
                        .route(web::get().to(handlers::search_books_by_text)),
                )
                .service(
                    web::scope("/book")
                        .service(web::resource("").route(web::post().to(handlers::save_book)))
                        .service(
                            web::scope("/{book_id}")
                                .service(
                                    web::resource("").route(web::get().to(handlers::get_book)),
                                )
                                .service(
                                    web::resource("/thumbnail")
                                        .route(web::get().to(handlers::get_book_thumbnail)),
                                ),
                        ),
                )
                .service(
                    web::resource("/series")
                        .route(web::get().to(handlers::list_series))
                        .route(web::post().to(handlers::save_series)),
                )
                .service(
                    web::resource("/series/{series_id}").route(web::get().to(handlers::get_series)),
                )
                .service(web::resource("/genre").route(web::post().to(handlers::add_genre)))
                .service(
                    web::resource("/reference-data")
                        .route(web::get().to(handlers::get_reference_data)),
                ),
        );
}
