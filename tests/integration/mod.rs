mod test_api_routes;
mod test_end_to_end;
mod test_fallback_logging;
mod test_http_client;
