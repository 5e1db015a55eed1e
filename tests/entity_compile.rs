use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use glam::Vec2;
use image::GenericImageView;
use roxmltree::Document;
use stagehand::compile::entity::{EntityCompiler, EntitySet};
use stagehand::compile::{texture, Ctx};
use stagehand::resources::{MediaLoader, Resources};
use stagehand::runtime::traits::Door;
use stagehand::runtime::world::{Action, SequenceStep};
use stagehand::runtime::{
    AnimationRouter, AudioHandle, CollisionZone, Entity, FontHandle, Geometry, RenderedText,
    TextureHandle, DEFAULT_ID,
};

struct StubMedia;

impl MediaLoader for StubMedia {
    fn load_texture<'a>(
        &'a self,
        _url: &'a str,
    ) -> LocalBoxFuture<'a, anyhow::Result<TextureHandle>> {
        async {
            Ok(TextureHandle::new(image::DynamicImage::ImageRgba8(image::RgbaImage::new(1, 1))))
        }
        .boxed_local()
    }

    fn load_audio<'a>(&'a self, _url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<AudioHandle>> {
        async { Ok(AudioHandle::new(vec![0.0f32; 8], 11025)) }.boxed_local()
    }
}

fn ctx_with(resources: Resources) -> Ctx {
    Ctx::new("mem://fixtures/entities.xml", Rc::new(resources), Rc::new(StubMedia))
}

fn compile_scope(xml: &str, resources: Resources) -> Rc<EntitySet> {
    let doc = Document::parse(xml).expect("fixture xml");
    let compiler = EntityCompiler::new(doc.root_element(), ctx_with(resources)).expect("scope tag");
    pollster::block_on(compiler.compile()).expect("scope compiles")
}

fn compile_first(xml: &str, id: &str, resources: Resources) -> Entity {
    compile_scope(xml, resources).get(id).expect("declared entity").factory.create()
}

const SNAKE_SCOPE: &str = r#"
<entities>
    <textures>
        <texture id="snake" src="snake.png" w="256" h="256"/>
    </textures>
    <animations texture="snake">
        <animation id="idle" w="48" h="48">
            <frame x="0" y="0" duration="2"/>
        </animation>
        <animation id="charge">
            <frame x="48" y="0" w="48" h="48" duration="0.25"/>
            <frame x="96" y="0" w="48" h="48" duration="0.25"/>
        </animation>
    </animations>
    <entity id="greader">
        <geometry type="plane" w="48" h="48"/>
    </entity>
</entities>"#;

#[test]
fn geometry_entity_gets_model_default_animator_and_primed_uvs() {
    let entity = compile_first(SNAKE_SCOPE, "greader", Resources::default());
    assert_eq!(entity.name.as_deref(), Some("greader"));

    let model = entity.model.as_ref().expect("model synthesized");
    assert_eq!(model.geometry.size, Vec2::splat(48.0));
    assert_eq!(model.geometry.face_count(), 1);

    let material = model.material.texture.as_ref().expect("default texture applied");
    let snake = entity.textures.get("snake").expect("snake texture");
    assert!(material.ptr_eq(&snake.handle));
    assert_eq!(material.image().dimensions(), (1, 1), "stub image behind the handle");

    assert_eq!(entity.animators.len(), 1, "no faces declared, default animator attached");
    let idle = entity.animations.get("idle").expect("idle animation");
    assert!(Rc::ptr_eq(entity.animators[0].animation(), idle));

    // The constructor primes UV maps, so frame one is already on the geometry.
    assert_eq!(model.geometry.uvs[0].min, Vec2::ZERO);
    assert_eq!(model.geometry.uvs[0].max, Vec2::new(0.1875, 0.1875));
}

#[test]
fn first_animation_parsed_aliases_as_default() {
    let entity = compile_first(SNAKE_SCOPE, "greader", Resources::default());
    let default = entity.animations.default_animation().expect("default animation");
    let idle = entity.animations.get("idle").expect("idle");
    assert!(Rc::ptr_eq(default, idle));
    assert_eq!(entity.animations.get("charge").expect("charge").len(), 2);
    assert!(entity.animations.ids().any(|id| id == "charge"));
}

#[test]
fn first_texture_parsed_becomes_default() {
    let doc = Document::parse(
        r#"
        <entities>
            <textures>
                <texture id="moot" src="moot.png" w="256" h="128"/>
                <texture id="foo" src="foo.png" w="64" h="96"/>
                <texture id="bar" src="bar.png" w="48" h="51"/>
            </textures>
        </entities>"#,
    )
    .expect("fixture xml");
    let set = pollster::block_on(texture::compile(doc.root_element(), &ctx_with(Resources::default())))
        .expect("textures load");
    assert_eq!(set.len(), 4, "three ids plus the default alias");
    let default = set.default_texture().expect("default record");
    assert_eq!(default.id, "moot");
    assert!(default.handle.ptr_eq(&set.get("moot").expect("moot").handle));
    assert_eq!(set.get("foo").expect("foo").size, Vec2::new(64.0, 96.0));
    assert_eq!(set.get("bar").expect("bar").size, Vec2::new(48.0, 51.0));
    assert!(set.ids().any(|id| id == DEFAULT_ID));
}

#[test]
fn duplicate_ids_abort_the_scope() {
    let doc = Document::parse(
        r#"
        <entities>
            <entity id="dup"/>
            <entity id="dup"/>
        </entities>"#,
    )
    .expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let err = pollster::block_on(compiler.compile()).expect_err("duplicate id");
    assert!(err.is_duplicate());
    assert_eq!(err.to_string(), "Object id \"dup\" already defined");
}

#[test]
fn repeat_compiles_return_the_same_set() {
    let doc = Document::parse(SNAKE_SCOPE).expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let first = pollster::block_on(compiler.compile()).expect("first compile");
    let second = pollster::block_on(compiler.compile()).expect("second compile");
    assert!(Rc::ptr_eq(&first, &second), "outcome cell hands out one shared set");
}

#[test]
fn only_direct_children_declare_entities() {
    let set = compile_scope(
        r#"
        <entities>
            <entity id="outer">
                <wrapper><entity id="inner"/></wrapper>
            </entity>
        </entities>"#,
        Resources::default(),
    );
    assert_eq!(set.len(), 1);
    assert!(set.contains("outer"));
    assert!(set.get("inner").is_none(), "nested markup never declares entities");
    let ids: Vec<_> = set.ids().collect();
    assert_eq!(ids, ["outer"]);
}

#[test]
fn faces_combine_json_indices_and_ranges() {
    let scope = r#"
        <entities>
            <textures><texture id="tiles" src="tiles.png" w="256" h="256"/></textures>
            <animations texture="tiles">
                <animation id="glow" w="16" h="16"><frame x="0" y="0" duration="1"/></animation>
            </animations>
            <entity id="wall">
                <geometry type="plane" w="256" h="128" w-segments="16" h-segments="8">
                    <face animation="glow" index="[0, 1, 2, 3, 4, 100, 112]"/>
                </geometry>
            </entity>
            <entity id="star-field">
                <geometry type="plane" w="256" h="16" w-segments="16" h-segments="2">
                    <face animation="glow">
                        <range start="0" end="32" step="2"/>
                    </face>
                </geometry>
            </entity>
        </entities>"#;
    let set = compile_scope(scope, Resources::default());

    let wall = set.get("wall").expect("wall").factory.create();
    assert_eq!(wall.animators.len(), 1);
    assert_eq!(wall.animators[0].indices, vec![0, 1, 2, 3, 4, 100, 112]);

    let stars = set.get("star-field").expect("star-field").factory.create();
    let expected: Vec<usize> = (0..32).step_by(2).collect();
    assert_eq!(stars.animators[0].indices, expected);
}

#[test]
fn text_entities_render_through_the_font_and_skip_animators() {
    let mut resources = Resources::default();
    resources.shared.add_font(
        "nintendo",
        FontHandle::new(|text| RenderedText {
            geometry: Geometry::plane(Vec2::new(8.0 * text.chars().count() as f32, 8.0), (1, 1)),
            texture: TextureHandle::new(image::DynamicImage::ImageRgba8(image::RgbaImage::new(
                8, 8,
            ))),
        }),
    );
    let entity = compile_first(
        r#"
        <entities>
            <textures><texture id="bg" src="bg.png" w="64" h="64"/></textures>
            <animations texture="bg">
                <animation id="shimmer"><frame x="0" y="0" w="8" h="8" duration="1"/></animation>
            </animations>
            <entity id="title">
                <text font="nintendo">MEGAMAN</text>
            </entity>
        </entities>"#,
        "title",
        resources,
    );
    let model = entity.model.as_ref().expect("rendered model");
    assert_eq!(model.geometry.size, Vec2::new(56.0, 8.0));
    assert!(entity.animators.is_empty(), "text bodies take no geometry animators");

    let record = entity.textures.default_texture().expect("rendered page is the default");
    assert_eq!(record.id, "title");
    assert!(model.material.texture.as_ref().expect("page texture").ptr_eq(&record.handle));
}

#[test]
fn unregistered_font_fails_the_entity() {
    let doc = Document::parse(
        r#"<entities><entity id="title"><text font="nintendo">HI</text></entity></entities>"#,
    )
    .expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let err = pollster::block_on(compiler.compile()).expect_err("font unregistered");
    assert_eq!(err.to_string(), "No resource \"nintendo\" of type font");
}

#[test]
fn collision_zones_parse_rects_and_circles() {
    let entity = compile_first(
        r#"
        <entities>
            <entity id="pin">
                <collision>
                    <rect w="32" h="16" x="4" y="2"/>
                    <circ r="12" x="-3" y="5"/>
                </collision>
            </entity>
        </entities>"#,
        "pin",
        Resources::default(),
    );
    assert_eq!(
        entity.collision,
        vec![
            CollisionZone::Rect { w: 32.0, h: 16.0, x: 4.0, y: 2.0 },
            CollisionZone::Circle { r: 12.0, x: -3.0, y: 5.0 },
        ]
    );
}

#[test]
fn unknown_collision_type_names_the_tag() {
    let doc = Document::parse(
        r#"<entities><entity id="pin"><collision><blob r="1"/></collision></entity></entities>"#,
    )
    .expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let err = pollster::block_on(compiler.compile()).expect_err("unknown zone");
    assert_eq!(err.to_string(), "No collision type \"blob\"");
}

#[test]
fn audio_entries_load_into_the_entity() {
    let entity = compile_first(
        r#"
        <entities>
            <entity id="boomer">
                <audio>
                    <clip id="boom" src="boom.ogg"/>
                    <clip id="tick" src="tick.ogg"/>
                </audio>
            </entity>
        </entities>"#,
        "boomer",
        Resources::default(),
    );
    assert_eq!(entity.audio.len(), 2);
    let boom = entity.audio.get("boom").expect("boom clip");
    assert_eq!(boom.sample_rate(), 11025);
    assert_eq!(boom.samples().len(), 8);
    assert!(boom.duration() > 0.0);
}

#[test]
fn events_and_sequences_wire_into_the_instance() {
    let entity = compile_first(
        r#"
        <entities>
            <entity id="core">
                <events>
                    <event name="hit"><action type="play-audio" id="clang"/></event>
                    <event name="death">
                        <action type="emit" name="explode"/>
                        <action type="run-sequence" id="farewell"/>
                    </event>
                </events>
                <sequences>
                    <sequence id="farewell">
                        <wait duration="0.5"/>
                        <action type="stop-audio" id="music"/>
                    </sequence>
                </sequences>
            </entity>
        </entities>"#,
        "core",
        Resources::default(),
    );
    let death: Vec<_> = entity.events.bindings_for("death").collect();
    assert_eq!(
        death,
        vec![
            &Action::EmitEvent("explode".to_string()),
            &Action::RunSequence("farewell".to_string()),
        ]
    );
    let farewell = entity.sequencer.sequence("farewell").expect("sequence registered");
    assert_eq!(
        farewell.steps,
        vec![
            SequenceStep::Wait(0.5),
            SequenceStep::Run(Action::StopAudio("music".to_string())),
        ]
    );
}

#[test]
fn goto_scene_is_not_an_entity_action() {
    let doc = Document::parse(
        r#"
        <entities>
            <entity id="core">
                <events>
                    <event name="death"><action type="goto-scene" id="credits"/></event>
                </events>
            </entity>
        </entities>"#,
    )
    .expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let err = pollster::block_on(compiler.compile()).expect_err("scene-only action");
    assert_eq!(err.to_string(), "No action type \"goto-scene\"");
}

#[test]
fn traits_attach_in_document_order() {
    let entity = compile_first(
        r#"
        <entities>
            <entity id="porter">
                <traits>
                    <trait name="climbable"/>
                    <trait name="door">
                        <direction x="-1" y="0"/>
                    </trait>
                </traits>
            </entity>
        </entities>"#,
        "porter",
        Resources::default(),
    );
    let names: Vec<_> = entity.traits().map(|t| t.name().to_string()).collect();
    assert_eq!(names, vec!["climbable", "door"]);
    let door = entity
        .trait_named("door")
        .and_then(|t| t.as_any().downcast_ref::<Door>())
        .expect("door trait");
    assert_eq!(door.direction, Vec2::new(-1.0, 0.0));
}

#[test]
fn script_routers_route_animations() {
    let entity = compile_first(
        r#"
        <entities>
            <entity id="fubar-bot">
                <animation-router>
                    fn route() { "test-value-is-fubar" }
                </animation-router>
            </entity>
        </entities>"#,
        "fubar-bot",
        Resources::default(),
    );
    assert_eq!(entity.route_animation().as_deref(), Some("test-value-is-fubar"));
}

#[test]
fn router_without_route_function_fails_the_compile() {
    let doc = Document::parse(
        r#"
        <entities>
            <entity id="bot">
                <animation-router>
                    fn wander() { "nope" }
                </animation-router>
            </entity>
        </entities>"#,
    )
    .expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let err = pollster::block_on(compiler.compile()).expect_err("no route fn");
    assert!(
        err.to_string().contains("must define route()"),
        "unexpected message: {err}"
    );
}

#[test]
fn named_routers_resolve_from_the_registry() {
    let mut resources = Resources::default();
    resources.shared.add_router("walker", AnimationRouter::new(|_| Some("walk".to_string())));
    let entity = compile_first(
        r#"
        <entities>
            <entity id="bot"><animation-router name="walker"/></entity>
        </entities>"#,
        "bot",
        resources,
    );
    assert_eq!(entity.route_animation().as_deref(), Some("walk"));

    let doc = Document::parse(
        r#"<entities><entity id="bot"><animation-router name="walker"/></entity></entities>"#,
    )
    .expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let err = pollster::block_on(compiler.compile()).expect_err("unregistered router");
    assert_eq!(err.to_string(), "No resource \"walker\" of type router");
}

#[test]
fn character_entities_build_on_the_registered_base() {
    let mut resources = Resources::default();
    resources.characters.add("Snake", || {
        let mut base = Entity::new();
        base.position.z = 7.0;
        base
    });
    let entity = compile_first(
        r#"
        <entities>
            <entity type="character" source="Snake" id="snake-boss"/>
        </entities>"#,
        "snake-boss",
        resources,
    );
    assert_eq!(entity.position.z, 7.0, "base constructor ran first");
    assert_eq!(entity.name.as_deref(), Some("snake-boss"));
}

#[test]
fn unregistered_character_source_fails() {
    let doc = Document::parse(
        r#"<entities><entity type="character" source="Ghost" id="g"/></entities>"#,
    )
    .expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let err = pollster::block_on(compiler.compile()).expect_err("unregistered character");
    assert_eq!(err.to_string(), "No resource \"Ghost\" of type character");
}

#[test]
fn animation_group_texture_must_exist() {
    let doc = Document::parse(
        r#"
        <entities>
            <textures><texture id="snake" src="s.png" w="64" h="64"/></textures>
            <animations texture="ghost">
                <animation id="a"><frame x="0" y="0" w="8" h="8"/></animation>
            </animations>
        </entities>"#,
    )
    .expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let err = pollster::block_on(compiler.compile()).expect_err("unknown texture");
    assert_eq!(err.to_string(), "Texture \"ghost\" not defined");
}

#[test]
fn unnamed_animation_group_requires_a_default_texture() {
    let doc = Document::parse(
        r#"
        <entities>
            <animations>
                <animation id="a"><frame x="0" y="0" w="8" h="8"/></animation>
            </animations>
        </entities>"#,
    )
    .expect("fixture xml");
    let compiler =
        EntityCompiler::new(doc.root_element(), ctx_with(Resources::default())).expect("scope tag");
    let err = pollster::block_on(compiler.compile()).expect_err("no default texture");
    assert_eq!(err.to_string(), "Default texture not defined");
}

#[test]
fn instances_do_not_share_mutable_state() {
    let set = compile_scope(SNAKE_SCOPE, Resources::default());
    let factory = &set.get("greader").expect("greader").factory;
    let mut first = factory.create();
    let second = factory.create();
    first.model.as_mut().expect("model").geometry.scale(2.0);
    assert_eq!(first.model.as_ref().expect("model").geometry.size, Vec2::splat(96.0));
    assert_eq!(second.model.as_ref().expect("model").geometry.size, Vec2::splat(48.0));
}

#[test]
fn source_spans_point_back_at_the_definition() {
    let set = compile_scope(SNAKE_SCOPE, Resources::default());
    let compiled = set.get("greader").expect("greader");
    assert_eq!(compiled.source.tag, "entity");
    assert!(compiled.source.line > 1);
    assert!(!compiled.source.range.is_empty());
}
