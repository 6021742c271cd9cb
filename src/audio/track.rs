use std::{path::PathBuf, sync::Arc, time::Duration};

/// Metadatos compartidos de una playlist de origen.
///
/// No contiene los tracks: los tracks apuntan aquí, y la [`Playlist`] es
/// quien los posee, así que no hay ciclo de referencias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub id: String,
    pub url: String,
    pub title: String,
    pub submitter: String,
    pub service: String,
}

/// Ordered, owning collection of tracks resolved from one source URL.
#[derive(Debug, Clone)]
pub struct Playlist {
    info: Arc<PlaylistInfo>,
    tracks: Vec<Track>,
}

impl Playlist {
    /// Builds the playlist and stamps every track with a back-reference to it.
    pub fn new(info: PlaylistInfo, tracks: Vec<Track>) -> Self {
        let info = Arc::new(info);
        let tracks = tracks
            .into_iter()
            .map(|mut track| {
                track.playlist = Some(Arc::clone(&info));
                track
            })
            .collect();

        Self { info, tracks }
    }

    pub fn info(&self) -> &PlaylistInfo {
        &self.info
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Consumes the playlist, yielding its tracks in source order.
    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }
}

/// Un item reproducible resuelto por un servicio.
#[derive(Debug, Clone)]
pub struct Track {
    id: String,
    url: String,
    title: String,
    author: String,
    author_url: String,
    submitter: String,
    service: String,
    filename: Option<PathBuf>,
    thumbnail_url: Option<String>,
    duration: Duration,
    playback_offset: Duration,
    playlist: Option<Arc<PlaylistInfo>>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        service: impl Into<String>,
        submitter: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
            author: String::new(),
            author_url: String::new(),
            submitter: submitter.into(),
            service: service.into(),
            filename: None,
            thumbnail_url: None,
            duration: Duration::ZERO,
            playback_offset: Duration::ZERO,
            playlist: None,
        }
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn author(&self) -> &str {
        &self.author
    }
    pub fn author_url(&self) -> &str {
        &self.author_url
    }
    pub fn submitter(&self) -> &str {
        &self.submitter
    }
    pub fn service(&self) -> &str {
        &self.service
    }
    /// Local cache path, or an empty string until the track is materialized.
    pub fn filename(&self) -> &str {
        self.filename
            .as_deref()
            .and_then(|p| p.to_str())
            .unwrap_or("")
    }
    pub fn thumbnail_url(&self) -> &str {
        self.thumbnail_url.as_deref().unwrap_or("")
    }
    pub fn duration(&self) -> Duration {
        self.duration
    }
    pub fn playback_offset(&self) -> Duration {
        self.playback_offset
    }
    /// `None` for a standalone track.
    pub fn playlist(&self) -> Option<&PlaylistInfo> {
        self.playlist.as_deref()
    }

    // Setters
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_author_url(mut self, author_url: impl Into<String>) -> Self {
        self.author_url = author_url.into();
        self
    }

    pub fn with_thumbnail_url(mut self, thumbnail_url: impl Into<String>) -> Self {
        let thumbnail_url = thumbnail_url.into();
        self.thumbnail_url = (!thumbnail_url.is_empty()).then_some(thumbnail_url);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub(crate) fn set_filename(&mut self, filename: PathBuf) {
        self.filename = Some(filename);
    }

    /// Offset never exceeds the duration. A track of unknown length
    /// (zero duration) keeps a zero offset.
    pub(crate) fn set_playback_offset(&mut self, offset: Duration) {
        self.playback_offset = offset.min(self.duration);
    }

    /// Time left to play, or zero when the duration is unknown.
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.playback_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn full_track() -> Track {
        let mut track = Track::new("id", "url", "title", "service", "submitter")
            .with_author("author")
            .with_author_url("author_url")
            .with_thumbnail_url("thumbnailurl")
            .with_duration(Duration::from_secs(1));
        track.set_filename(PathBuf::from("filename"));
        track.set_playback_offset(Duration::from_millis(2));

        let playlist = Playlist::new(
            PlaylistInfo {
                id: "pl".into(),
                url: "playlist_url".into(),
                title: "playlist".into(),
                submitter: "submitter".into(),
                service: "service".into(),
            },
            vec![track],
        );
        playlist.into_tracks().remove(0)
    }

    #[test]
    fn accessors_return_stored_values() {
        let track = full_track();

        assert_eq!(track.id(), "id");
        assert_eq!(track.url(), "url");
        assert_eq!(track.title(), "title");
        assert_eq!(track.author(), "author");
        assert_eq!(track.author_url(), "author_url");
        assert_eq!(track.submitter(), "submitter");
        assert_eq!(track.service(), "service");
        assert_eq!(track.filename(), "filename");
        assert_eq!(track.thumbnail_url(), "thumbnailurl");
        assert_eq!(track.duration(), Duration::from_secs(1));
        assert_eq!(track.playback_offset(), Duration::from_millis(2));
        assert_eq!(track.playlist().map(|p| p.title.as_str()), Some("playlist"));
    }

    #[test]
    fn unset_optional_fields_fall_back_to_empty() {
        let track = Track::new("id", "url", "title", "service", "submitter");

        for _ in 0..2 {
            assert_eq!(track.filename(), "");
            assert_eq!(track.thumbnail_url(), "");
            assert!(track.playlist().is_none());
        }
    }

    #[test]
    fn empty_thumbnail_is_treated_as_unset() {
        let track = Track::new("id", "url", "title", "service", "submitter").with_thumbnail_url("");
        assert_eq!(track.thumbnail_url(), "");
    }

    #[test]
    fn playback_offset_is_clamped_to_duration() {
        let mut track = Track::new("id", "url", "title", "service", "submitter")
            .with_duration(Duration::from_secs(10));
        track.set_playback_offset(Duration::from_secs(30));

        assert_eq!(track.playback_offset(), Duration::from_secs(10));
        assert_eq!(track.remaining(), Duration::ZERO);
    }

    #[test]
    fn unknown_duration_keeps_offset_at_zero() {
        let mut track = Track::new("id", "url", "title", "service", "submitter");
        track.set_playback_offset(Duration::from_secs(30));

        assert_eq!(track.playback_offset(), Duration::ZERO);
    }

    #[test]
    fn playlist_keeps_source_order_and_back_references() {
        let tracks = (1..=3)
            .map(|i| Track::new(i.to_string(), format!("url{i}"), format!("t{i}"), "svc", "me"))
            .collect();
        let playlist = Playlist::new(
            PlaylistInfo {
                id: "pl".into(),
                url: "pl_url".into(),
                title: "Mix".into(),
                submitter: "me".into(),
                service: "svc".into(),
            },
            tracks,
        );

        assert_eq!(playlist.len(), 3);
        assert_eq!(playlist.info().title, "Mix");
        let titles: Vec<_> = playlist.tracks().iter().map(|t| t.title().to_string()).collect();
        assert_eq!(titles, vec!["t1", "t2", "t3"]);
        assert!(playlist
            .tracks()
            .iter()
            .all(|t| t.playlist().map(|p| p.id.as_str()) == Some("pl")));
    }
}
