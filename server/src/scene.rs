//! Scene export: turns a resolved configuration into the three.js object
//! JSON that the client loads with `THREE.ObjectLoader`.
//!
//! Scene construction sits behind [`SceneBuilder`]; the server only calls it
//! and serializes the result. [`PoolHall`] is the built-in builder.

use std::f64::consts::PI;

use poolvr_shared::config::{is_truthy, ConfigMap};
use serde::Serialize;
use serde_json::Value;

const FORMAT_VERSION: f64 = 4.3;
const TABLE_THICKNESS: f64 = 0.05;
const FLOOR_SIZE: f64 = 10.0;
const SKYBOX_SIZE: f64 = 100.0;
/// three.js `BackSide`
const BACK_SIDE: u8 = 1;

/// Cue ball, solids 1-7, eight ball, stripes 9-15 share the solids' colors.
const BALL_COLORS: [u32; 16] = [
    0xffffff, 0xffd700, 0x0000ff, 0xff0000, 0x800080, 0xff8c00, 0x006400, 0x800000, 0x000000,
    0xffd700, 0x0000ff, 0xff0000, 0x800080, 0xff8c00, 0x006400, 0x800000,
];

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("scene option {0} is missing")]
    MissingOption(&'static str),
    #[error("scene option {key} must be a number, got {value}")]
    NotANumber { key: &'static str, value: Value },
    #[error("failed to serialize scene: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Builds scenes from resolved configuration values.
pub trait SceneBuilder: Send + Sync {
    /// The playable pool hall.
    fn pool_hall(&self, config: &ConfigMap) -> Result<SceneExport, SceneError>;

    /// The configurator scene. Asset URLs are prefixed with `url_prefix`.
    fn config_scene(&self, url_prefix: &str, config: &ConfigMap)
        -> Result<SceneExport, SceneError>;
}

/// Serialize a scene: 2-space pretty in debug mode, compact otherwise.
pub fn export_json(scene: &SceneExport, debug: bool) -> Result<String, SceneError> {
    let json = if debug {
        serde_json::to_string_pretty(scene)?
    } else {
        serde_json::to_string(scene)?
    };
    Ok(json)
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneExport {
    pub metadata: Metadata,
    pub geometries: Vec<Geometry>,
    pub materials: Vec<Material>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    pub object: Object3D,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub version: f64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub generator: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Geometry {
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(flatten)]
    pub params: ConfigMap,
}

#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub uuid: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Texture {
    pub uuid: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LightProps {
    pub color: u32,
    pub intensity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Object3D {
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    /// Column-major 4x4 transform.
    pub matrix: [f64; 16],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(flatten)]
    pub light: Option<LightProps>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    #[serde(skip_serializing_if = "ConfigMap::is_empty")]
    pub user_data: ConfigMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Object3D>,
}

impl Object3D {
    fn new(kind: &'static str, name: &str) -> Self {
        Self {
            uuid: name.to_string(),
            kind,
            name: name.to_string(),
            matrix: translation([0.0, 0.0, 0.0]),
            geometry: None,
            material: None,
            light: None,
            cast_shadow: false,
            receive_shadow: false,
            user_data: ConfigMap::new(),
            children: Vec::new(),
        }
    }

    fn mesh(name: &str, geometry: &str, material: &str, position: [f64; 3]) -> Self {
        Self {
            matrix: translation(position),
            geometry: Some(geometry.to_string()),
            material: Some(material.to_string()),
            ..Self::new("Mesh", name)
        }
    }

    fn light(kind: &'static str, name: &str, position: [f64; 3], props: LightProps) -> Self {
        Self {
            matrix: translation(position),
            light: Some(props),
            ..Self::new(kind, name)
        }
    }
}

fn translation([x, y, z]: [f64; 3]) -> [f64; 16] {
    [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, x, y, z, 1.0,
    ]
}

/// Rotation of -90 degrees about x, laying a plane flat.
fn lay_flat() -> [f64; 16] {
    [
        1.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ]
}

fn number(config: &ConfigMap, key: &'static str) -> Result<f64, SceneError> {
    let value = config.get(key).ok_or(SceneError::MissingOption(key))?;
    value.as_f64().ok_or_else(|| SceneError::NotANumber {
        key,
        value: value.clone(),
    })
}

fn flag(config: &ConfigMap, key: &str) -> bool {
    config.get(key).is_some_and(is_truthy)
}

fn params(pairs: &[(&str, f64)]) -> ConfigMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

/// Accumulates geometry, materials and objects while a scene is assembled.
struct SceneAssembler {
    basic_materials: bool,
    shadows: bool,
    geometries: Vec<Geometry>,
    materials: Vec<Material>,
    images: Vec<Image>,
    textures: Vec<Texture>,
    children: Vec<Object3D>,
}

impl SceneAssembler {
    fn new(config: &ConfigMap) -> Self {
        Self {
            basic_materials: flag(config, "useBasicMaterials"),
            shadows: flag(config, "useShadowMap"),
            geometries: Vec::new(),
            materials: Vec::new(),
            images: Vec::new(),
            textures: Vec::new(),
            children: Vec::new(),
        }
    }

    fn surface_kind(&self) -> &'static str {
        if self.basic_materials {
            "MeshBasicMaterial"
        } else {
            "MeshPhongMaterial"
        }
    }

    fn geometry(&mut self, uuid: &str, kind: &'static str, params: ConfigMap) {
        self.geometries.push(Geometry {
            uuid: uuid.to_string(),
            kind,
            params,
        });
    }

    fn material(&mut self, uuid: &str, color: u32) {
        let kind = self.surface_kind();
        self.materials.push(Material {
            uuid: uuid.to_string(),
            kind,
            color,
            map: None,
            side: None,
        });
    }

    fn floor(&mut self) {
        self.geometry(
            "floorGeometry",
            "PlaneBufferGeometry",
            params(&[("width", FLOOR_SIZE), ("height", FLOOR_SIZE)]),
        );
        self.material("floorMaterial", 0x7b5a3a);
        let mut floor = Object3D::mesh("floor", "floorGeometry", "floorMaterial", [0.0; 3]);
        floor.matrix = lay_flat();
        floor.receive_shadow = self.shadows;
        self.children.push(floor);
    }

    /// Table top and a full rack.
    fn table(&mut self, config: &ConfigMap) -> Result<(), SceneError> {
        let length = number(config, "L_table")?;
        let height = number(config, "H_table")?;
        let diameter = number(config, "ball_diameter")?;
        let width = length / 2.0;

        self.geometry(
            "tableGeometry",
            "BoxGeometry",
            params(&[
                ("width", width),
                ("height", TABLE_THICKNESS),
                ("depth", length),
            ]),
        );
        self.material("feltMaterial", 0x00aa00);
        let mut table = Object3D::mesh(
            "table",
            "tableGeometry",
            "feltMaterial",
            [0.0, height - TABLE_THICKNESS / 2.0, 0.0],
        );
        table.receive_shadow = self.shadows;
        table.user_data.insert("L_table".into(), Value::from(length));
        table.user_data.insert("W_table".into(), Value::from(width));
        self.children.push(table);

        self.geometry(
            "ballGeometry",
            "SphereBufferGeometry",
            params(&[
                ("radius", diameter / 2.0),
                ("widthSegments", 16.0),
                ("heightSegments", 12.0),
            ]),
        );
        let y = height + diameter / 2.0;
        for (ball_number, position) in rack_positions(length, diameter, y).into_iter().enumerate()
        {
            let material = format!("ballMaterial{ball_number}");
            self.material(&material, BALL_COLORS[ball_number]);
            let name = format!("ball {ball_number}");
            let mut ball = Object3D::mesh(&name, "ballGeometry", &material, position);
            ball.cast_shadow = self.shadows;
            ball.user_data
                .insert("ballNumber".into(), Value::from(ball_number));
            self.children.push(ball);
        }
        Ok(())
    }

    fn skybox(&mut self, url_prefix: &str) {
        self.images.push(Image {
            uuid: "skyboxImage".into(),
            url: format!("{url_prefix}images/skybox.png"),
        });
        self.textures.push(Texture {
            uuid: "skyboxTexture".into(),
            image: "skyboxImage".into(),
        });
        self.geometry(
            "skyboxGeometry",
            "BoxGeometry",
            params(&[
                ("width", SKYBOX_SIZE),
                ("height", SKYBOX_SIZE),
                ("depth", SKYBOX_SIZE),
            ]),
        );
        self.materials.push(Material {
            uuid: "skyboxMaterial".into(),
            kind: "MeshBasicMaterial",
            color: 0xffffff,
            map: Some("skyboxTexture".into()),
            side: Some(BACK_SIDE),
        });
        self.children.push(Object3D::mesh(
            "skybox",
            "skyboxGeometry",
            "skyboxMaterial",
            [0.0; 3],
        ));
    }

    fn lights(&mut self, config: &ConfigMap, table_height: f64) {
        self.children.push(Object3D::light(
            "AmbientLight",
            "ambient",
            [0.0; 3],
            LightProps {
                color: 0x404040,
                intensity: 1.0,
                distance: None,
                angle: None,
            },
        ));
        if flag(config, "useSpotLight") {
            let mut spot = Object3D::light(
                "SpotLight",
                "spotLight",
                [0.0, table_height + 2.0, 0.0],
                LightProps {
                    color: 0xffffee,
                    intensity: 1.0,
                    distance: Some(10.0),
                    angle: Some(PI / 4.0),
                },
            );
            spot.cast_shadow = self.shadows;
            self.children.push(spot);
        }
        if flag(config, "usePointLight") || flag(config, "pointLight") {
            self.children.push(Object3D::light(
                "PointLight",
                "pointLight",
                [0.0, table_height + 1.5, 0.0],
                LightProps {
                    color: 0xffffff,
                    intensity: 0.8,
                    distance: Some(8.0),
                    angle: None,
                },
            ));
        }
    }

    fn finish(self, name: &str, config: &ConfigMap) -> SceneExport {
        let mut scene = Object3D::new("Scene", name);
        scene.children = self.children;
        if let Some(gravity) = config.get("gravity") {
            scene.user_data.insert("gravity".into(), gravity.clone());
        }
        SceneExport {
            metadata: Metadata {
                version: FORMAT_VERSION,
                kind: "Object",
                generator: "poolvr-server",
            },
            geometries: self.geometries,
            materials: self.materials,
            images: self.images,
            textures: self.textures,
            object: scene,
        }
    }
}

/// Cue ball on the head spot, fifteen balls racked in a triangle on the foot spot.
fn rack_positions(length: f64, diameter: f64, y: f64) -> Vec<[f64; 3]> {
    let mut positions = vec![[0.0, y, length / 4.0]];
    let row_step = diameter * 3f64.sqrt() / 2.0;
    for row in 0..5 {
        let z = -length / 4.0 - row as f64 * row_step;
        for i in 0..=row {
            let x = (i as f64 - row as f64 / 2.0) * diameter;
            positions.push([x, y, z]);
        }
    }
    positions
}

/// The built-in scene builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolHall;

impl SceneBuilder for PoolHall {
    fn pool_hall(&self, config: &ConfigMap) -> Result<SceneExport, SceneError> {
        let mut assembler = SceneAssembler::new(config);
        assembler.floor();
        assembler.table(config)?;
        assembler.lights(config, number(config, "H_table")?);
        if flag(config, "skybox") {
            assembler.skybox("");
        }
        Ok(assembler.finish("pool hall", config))
    }

    fn config_scene(
        &self,
        url_prefix: &str,
        config: &ConfigMap,
    ) -> Result<SceneExport, SceneError> {
        let mut assembler = SceneAssembler::new(config);
        assembler.table(config)?;
        assembler.lights(config, number(config, "H_table")?);
        assembler.skybox(url_prefix);
        Ok(assembler.finish("configurator", config))
    }
}
